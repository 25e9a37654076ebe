// TaskHero schema - project, PRD, task and configuration tables for Diesel ORM
//
// The `table!` declarations below and the DDL constants further down describe the
// same tables; both the fresh-init path and the legacy migration path create the
// store from CREATE_TABLES / CREATE_INDEXES / CREATE_TRIGGERS.

diesel::table! {
    schema_versions (id) {
        id -> Integer,
        version -> Text,
        name -> Text,
        features -> Text,
        introduced_at -> Text,
    }
}

diesel::table! {
    projects (id) {
        id -> Integer,
        name -> Text,
        description -> Nullable<Text>,
        root_path -> Text,
        status -> Text,
        metadata -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    configurations (id) {
        id -> Integer,
        project_id -> Nullable<Integer>,   // NULL = global setting
        config_type -> Text,
        key -> Text,
        value -> Text,                      // JSON-serialized value
        is_default -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    prds (id) {
        id -> Integer,
        project_id -> Integer,
        identifier -> Text,
        title -> Text,
        file_name -> Text,
        file_path -> Nullable<Text>,
        file_hash -> Nullable<Text>,
        file_size -> Nullable<BigInt>,
        status -> Text,
        complexity -> Text,
        priority -> Text,
        description -> Nullable<Text>,
        tags -> Text,                       // JSON array
        estimated_effort -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
        last_parsed_at -> Nullable<Text>,
        metadata -> Text,
    }
}

diesel::table! {
    tasks (id) {
        id -> Integer,
        project_id -> Integer,
        prd_id -> Nullable<Integer>,
        parent_task_id -> Nullable<Integer>,
        identifier -> Text,                 // dotted, e.g. "3.2.1"
        title -> Text,
        description -> Nullable<Text>,
        details -> Nullable<Text>,
        test_strategy -> Nullable<Text>,
        status -> Text,
        priority -> Text,
        complexity_score -> Nullable<Integer>,
        complexity_level -> Nullable<Text>,
        estimated_hours -> Nullable<Double>,
        actual_hours -> Nullable<Double>,
        assignee -> Nullable<Text>,
        due_date -> Nullable<Text>,
        started_at -> Nullable<Text>,
        completed_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
        metadata -> Text,
    }
}

diesel::table! {
    task_dependencies (id) {
        id -> Integer,
        task_id -> Integer,
        depends_on_task_id -> Integer,
        dependency_type -> Text,
        created_at -> Text,
    }
}

diesel::joinable!(prds -> projects (project_id));
diesel::joinable!(tasks -> projects (project_id));
diesel::joinable!(tasks -> prds (prd_id));

diesel::allow_tables_to_appear_in_same_query!(
    schema_versions,
    projects,
    configurations,
    prds,
    tasks,
    task_dependencies,
);

// ============================================================================
// DDL
// ============================================================================

/// Domain tables in foreign-key order; creation must follow it.
pub const TABLE_CREATION_ORDER: &[&str] = &[
    "projects",
    "configurations",
    "prds",
    "tasks",
    "task_dependencies",
];

/// CREATE TABLE statements, paired with their table name, in creation order.
pub const CREATE_TABLES: &[(&str, &str)] = &[
    (
        "schema_versions",
        r#"
        CREATE TABLE IF NOT EXISTS schema_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            version TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            features TEXT NOT NULL,
            introduced_at TEXT NOT NULL
        )"#,
    ),
    (
        "projects",
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            root_path TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'archived', 'deleted')),
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"#,
    ),
    (
        "configurations",
        r#"
        CREATE TABLE IF NOT EXISTS configurations (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            project_id INTEGER REFERENCES projects(id) ON DELETE CASCADE,
            config_type TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"#,
    ),
    (
        "prds",
        r#"
        CREATE TABLE IF NOT EXISTS prds (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            identifier TEXT NOT NULL,
            title TEXT NOT NULL CHECK (length(trim(title)) > 0),
            file_name TEXT NOT NULL,
            file_path TEXT,
            file_hash TEXT,
            file_size INTEGER,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'in-progress', 'done', 'archived')),
            complexity TEXT NOT NULL DEFAULT 'medium'
                CHECK (complexity IN ('low', 'medium', 'high', 'very-high')),
            priority TEXT NOT NULL DEFAULT 'medium'
                CHECK (priority IN ('low', 'medium', 'high')),
            description TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            estimated_effort TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_parsed_at TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            UNIQUE (project_id, identifier)
        )"#,
    ),
    (
        "tasks",
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            prd_id INTEGER REFERENCES prds(id) ON DELETE SET NULL,
            parent_task_id INTEGER REFERENCES tasks(id) ON DELETE CASCADE,
            identifier TEXT NOT NULL,
            title TEXT NOT NULL CHECK (length(trim(title)) > 0),
            description TEXT,
            details TEXT,
            test_strategy TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'in-progress', 'done', 'review', 'blocked', 'deferred', 'cancelled')),
            priority TEXT NOT NULL DEFAULT 'medium'
                CHECK (priority IN ('low', 'medium', 'high')),
            complexity_score INTEGER CHECK (complexity_score BETWEEN 1 AND 10),
            complexity_level TEXT
                CHECK (complexity_level IN ('low', 'medium', 'high', 'very-high')),
            estimated_hours REAL,
            actual_hours REAL,
            assignee TEXT,
            due_date TEXT,
            started_at TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            UNIQUE (project_id, identifier)
        )"#,
    ),
    (
        "task_dependencies",
        r#"
        CREATE TABLE IF NOT EXISTS task_dependencies (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            depends_on_task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            dependency_type TEXT NOT NULL DEFAULT 'blocks'
                CHECK (dependency_type IN ('blocks', 'requires', 'related')),
            created_at TEXT NOT NULL,
            UNIQUE (task_id, depends_on_task_id),
            CHECK (task_id <> depends_on_task_id)
        )"#,
    ),
];

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_config_global ON configurations(config_type, key) WHERE project_id IS NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_config_project ON configurations(project_id, config_type, key) WHERE project_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS idx_prds_project ON prds(project_id)",
    "CREATE INDEX IF NOT EXISTS idx_prds_status ON prds(status)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_prd ON tasks(prd_id)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_task_id)",
    "CREATE INDEX IF NOT EXISTS idx_deps_task ON task_dependencies(task_id)",
    "CREATE INDEX IF NOT EXISTS idx_deps_depends_on ON task_dependencies(depends_on_task_id)",
];

/// Keep `updated_at` fresh for raw UPDATE statements that don't set it.
pub const CREATE_TRIGGERS: &[&str] = &[
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_projects_updated_at
    AFTER UPDATE ON projects FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
    BEGIN
        UPDATE projects SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = NEW.id;
    END"#,
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_configurations_updated_at
    AFTER UPDATE ON configurations FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
    BEGIN
        UPDATE configurations SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = NEW.id;
    END"#,
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_prds_updated_at
    AFTER UPDATE ON prds FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
    BEGIN
        UPDATE prds SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = NEW.id;
    END"#,
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_tasks_updated_at
    AFTER UPDATE ON tasks FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
    BEGIN
        UPDATE tasks SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = NEW.id;
    END"#,
];

/// Validation query: which of the domain tables already exist.
pub fn existing_tables_query() -> String {
    let names: Vec<String> = TABLE_CREATION_ORDER
        .iter()
        .map(|t| format!("'{}'", t))
        .collect();
    format!(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ({}) ORDER BY name",
        names.join(", ")
    )
}

/// Whole DDL script in creation order.
pub fn full_ddl() -> String {
    let mut script = String::new();
    for (_, sql) in CREATE_TABLES {
        script.push_str(sql);
        script.push_str(";\n");
    }
    for sql in CREATE_INDEXES.iter().chain(CREATE_TRIGGERS) {
        script.push_str(sql);
        script.push_str(";\n");
    }
    script
}

// ============================================================================
// Schema version
// ============================================================================

/// Current schema version for the store
pub const CURRENT_SCHEMA: StoreSchema = StoreSchema {
    major: 1,
    minor: 0,
    patch: 0,
    name: "taskhero-store",
    features: &[
        "projects",
        "configurations",
        "prds",
        "tasks",
        "task_dependencies",
    ],
};

/// Describes the version and capabilities of the schema
#[derive(Debug, Clone)]
pub struct StoreSchema {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub name: &'static str,
    pub features: &'static [&'static str],
}

impl StoreSchema {
    pub fn version_string(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    pub fn is_compatible_with(&self, other: &StoreSchema) -> bool {
        self.major == other.major
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(&feature)
    }
}

impl std::fmt::Display for StoreSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{} ({})", self.version_string(), self.name)
    }
}
