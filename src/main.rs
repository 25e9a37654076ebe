use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use std::io;
use std::path::{Path, PathBuf};
use taskhero::{
    find_project_root, BackupManager, BackupType, Database, DbError, MigrationState, Migrator,
    NextTaskCriteria, Result, StoreConfig,
};
use tracing_subscriber::EnvFilter;

/// Environment override for the database file location
const DB_PATH_ENV: &str = "TASKHERO_DB_PATH";

#[derive(Parser, Debug)]
#[command(name = "taskhero")]
#[command(author, version, about = "SQLite store for TaskHero projects, PRDs and tasks")]
struct Cli {
    /// Project root (default: nearest directory containing .taskmaster, else the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the store, importing legacy JSON files if present
    #[command(alias = "migrate")]
    Init,

    /// Show schema version and row counts
    Status,

    /// Print the next task that is ready to start
    Next {
        /// Only consider tasks linked to this PRD
        #[arg(long)]
        prd: Option<i32>,

        /// Skip subtasks
        #[arg(long)]
        top_level: bool,
    },

    /// Manage database snapshots
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Generate shell completions
    Completion {
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum BackupAction {
    /// Snapshot the database now
    Create,
    /// List snapshots, newest first
    List,
    /// Replace the database with a snapshot
    Restore {
        /// Snapshot file name, as shown by `backup list`
        file: String,
    },
    /// Delete all but the newest snapshots
    Cleanup {
        /// How many to keep (default: backup.max_kept from store.toml)
        #[arg(long)]
        keep: Option<usize>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskhero=info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "taskhero", &mut io::stdout());
            Ok(())
        }
        Command::Init => {
            let root = resolve_root(cli.root, false)?;
            init(&root)
        }
        Command::Status => {
            let db = open(&resolve_root(cli.root, true)?)?;
            status(&db)
        }
        Command::Next { prd, top_level } => {
            let db = open(&resolve_root(cli.root, true)?)?;
            next(
                &db,
                &NextTaskCriteria {
                    prd_id: prd,
                    exclude_subtasks: top_level,
                },
            )
        }
        Command::Backup { action } => {
            let db = open(&resolve_root(cli.root, true)?)?;
            backup(&db, action)
        }
    }
}

/// `--root` wins; otherwise search upward (when `discover`) or use the cwd.
fn resolve_root(explicit: Option<PathBuf>, discover: bool) -> Result<PathBuf> {
    let root = match explicit {
        Some(root) => root,
        None => {
            let cwd = std::env::current_dir()?;
            if discover {
                find_project_root(&cwd).unwrap_or(cwd)
            } else {
                cwd
            }
        }
    };
    Ok(root.canonicalize().unwrap_or(root))
}

fn open(root: &Path) -> Result<Database> {
    let mut config = StoreConfig::load(root);
    if let Some(path) = std::env::var_os(DB_PATH_ENV).filter(|p| !p.is_empty()) {
        config.database.path = Some(PathBuf::from(path));
    }
    Database::initialize(root, &config)
}

fn init(root: &Path) -> Result<()> {
    println!("\n{}", "Initializing TaskHero store...".cyan().bold());
    println!("   Directory: {}\n", root.display());

    let db = open(root)?;
    let report = Migrator::new(&db).run()?;
    match report.state {
        MigrationState::AlreadyMigrated => {
            println!("   {} project already initialized", "Skipping".yellow());
        }
        MigrationState::FreshInit => {
            println!("   {} {}", "Creating".green(), db.db_path().display());
            println!(
                "   {} {} default setting(s)",
                "Seeding".green(),
                report.counts.defaults_seeded
            );
        }
        MigrationState::Migrated => {
            let c = &report.counts;
            println!("   {} {} task(s), {} subtask(s)", "Imported".green(), c.tasks, c.subtasks);
            println!("   {} {} PRD(s)", "Imported".green(), c.prds);
            println!("   {} {} setting(s)", "Imported".green(), c.configurations);
            println!("   {} {} dependency edge(s)", "Linked".green(), c.dependencies);
            if let Some(dir) = &report.legacy_backup {
                println!("   {} legacy JSON copied to {}", "Saved".green(), dir.display());
            }
        }
    }
    println!("\n{}", "TaskHero store ready!".green().bold());
    Ok(())
}

fn status(db: &Database) -> Result<()> {
    let root = db.project_root().to_string_lossy().into_owned();
    let project = db.projects().find_by_root_path(&root)?;
    let counts = db.table_counts()?;

    println!("{}", "TaskHero store".cyan().bold());
    println!("   Database: {}", db.db_path().display());
    match db.schema_version()? {
        Some(v) => println!("   Schema:   {} ({})", v.version, v.name),
        None => println!("   Schema:   {}", "unknown".yellow()),
    }
    match project {
        Some(p) => println!("   Project:  {} [{}]", p.name, p.status),
        None => println!("   Project:  {} (run `taskhero init`)", "not initialized".yellow()),
    }
    println!();
    println!("   {:<18} {}", "projects", counts.projects);
    println!("   {:<18} {}", "prds", counts.prds);
    println!("   {:<18} {}", "tasks", counts.tasks);
    println!("   {:<18} {}", "task_dependencies", counts.task_dependencies);
    println!("   {:<18} {}", "configurations", counts.configurations);
    Ok(())
}

fn next(db: &Database, criteria: &NextTaskCriteria) -> Result<()> {
    let root = db.project_root().to_string_lossy().into_owned();
    let project = db
        .projects()
        .find_by_root_path(&root)?
        .ok_or_else(|| DbError::Validation("Project not initialized; run `taskhero init`".to_string()))?;

    match db.tasks().find_next_task(project.id, criteria)? {
        Some(task) => {
            println!(
                "{} {} {}",
                format!("[{}]", task.identifier).cyan().bold(),
                task.title.bold(),
                format!("({})", task.priority).dimmed()
            );
            if let Some(description) = &task.description {
                println!("   {}", description);
            }
        }
        None => println!("{}", "No task is ready to start.".yellow()),
    }
    Ok(())
}

fn backup(db: &Database, action: BackupAction) -> Result<()> {
    let manager = BackupManager::new(db);
    match action {
        BackupAction::Create => {
            let info = manager.create_backup(BackupType::Manual)?;
            println!("{} {} ({} bytes)", "Created".green(), info.filename, info.size_bytes);
        }
        BackupAction::List => {
            let backups = manager.list_backups()?;
            if backups.is_empty() {
                println!("No backups in {}", manager.backup_dir().display());
            }
            for info in backups {
                println!(
                    "{}  {:<14} {:>10} bytes  {}",
                    info.created_at,
                    info.backup_type.to_string(),
                    info.size_bytes,
                    info.filename
                );
            }
        }
        BackupAction::Restore { file } => {
            let safety = manager.restore_backup(&file)?;
            println!("{} {}", "Restored".green(), file);
            println!("   previous state saved as {}", safety.filename);
        }
        BackupAction::Cleanup { keep } => {
            let keep = keep.unwrap_or(db.store_config().backup.max_kept);
            let removed = manager.cleanup_old_backups(keep)?;
            for name in &removed {
                println!("{} {}", "Removed".yellow(), name);
            }
            println!("{} backup(s) removed, {} kept at most", removed.len(), keep);
        }
    }
    Ok(())
}
