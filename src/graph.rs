//! Reachability over the task dependency graph.
//!
//! Nodes are task ids. An edge `a -> b` means "a depends on b". The store never
//! materializes the graph; callers pass a neighbor lookup (usually an
//! adjacency query on the open connection).

use std::collections::{BTreeMap, HashSet};

/// Depth-first search: is `target` reachable from `start`?
pub fn reaches<E, F>(start: i32, target: i32, mut neighbors: F) -> Result<bool, E>
where
    F: FnMut(i32) -> Result<Vec<i32>, E>,
{
    let mut stack = vec![start];
    let mut visited: HashSet<i32> = HashSet::new();

    while let Some(current) = stack.pop() {
        if current == target {
            return Ok(true);
        }
        if !visited.insert(current) {
            continue;
        }
        for next in neighbors(current)? {
            if !visited.contains(&next) {
                stack.push(next);
            }
        }
    }
    Ok(false)
}

/// Would adding `task -> depends_on` close a cycle?
/// True when `depends_on` already reaches `task`, or for a self-loop.
pub fn would_create_cycle<E, F>(task: i32, depends_on: i32, neighbors: F) -> Result<bool, E>
where
    F: FnMut(i32) -> Result<Vec<i32>, E>,
{
    if task == depends_on {
        return Ok(true);
    }
    reaches(depends_on, task, neighbors)
}

/// Whole-graph check (Kahn's algorithm) over an edge list.
pub fn is_acyclic(edges: &[(i32, i32)]) -> bool {
    let mut indegree: BTreeMap<i32, usize> = BTreeMap::new();
    let mut adjacency: BTreeMap<i32, Vec<i32>> = BTreeMap::new();

    for &(from, to) in edges {
        indegree.entry(from).or_insert(0);
        *indegree.entry(to).or_insert(0) += 1;
        adjacency.entry(from).or_default().push(to);
    }

    let mut ready: Vec<i32> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| *n)
        .collect();
    let mut seen = 0usize;

    while let Some(node) = ready.pop() {
        seen += 1;
        if let Some(targets) = adjacency.get(&node) {
            for target in targets {
                if let Some(d) = indegree.get_mut(target) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(*target);
                    }
                }
            }
        }
    }

    seen == indegree.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::convert::Infallible;

    fn lookup(edges: &[(i32, i32)]) -> impl FnMut(i32) -> Result<Vec<i32>, Infallible> + '_ {
        move |node| {
            Ok(edges
                .iter()
                .filter(|(from, _)| *from == node)
                .map(|(_, to)| *to)
                .collect())
        }
    }

    #[test]
    fn test_reaches_transitively() {
        let edges = [(1, 2), (2, 3), (4, 1)];
        assert!(reaches(1, 3, lookup(&edges)).unwrap());
        assert!(reaches(4, 3, lookup(&edges)).unwrap());
        assert!(!reaches(3, 1, lookup(&edges)).unwrap());
    }

    #[test]
    fn test_cycle_detection() {
        let edges = [(1, 2), (2, 3)];
        assert!(would_create_cycle(3, 1, lookup(&edges)).unwrap());
        assert!(would_create_cycle(5, 5, lookup(&edges)).unwrap());
        assert!(!would_create_cycle(1, 3, lookup(&edges)).unwrap());
    }

    #[test]
    fn test_is_acyclic() {
        assert!(is_acyclic(&[(1, 2), (2, 3), (1, 3)]));
        assert!(!is_acyclic(&[(1, 2), (2, 3), (3, 1)]));
        assert!(is_acyclic(&[]));
    }

    #[test]
    fn test_neighbor_errors_propagate() {
        let result = reaches(1, 2, |_| Err::<Vec<i32>, _>("lookup failed"));
        assert_eq!(result, Err("lookup failed"));
    }

    proptest! {
        #[test]
        fn prop_guarded_inserts_stay_acyclic(candidates in prop::collection::vec((0i32..12, 0i32..12), 0..60)) {
            let mut edges: Vec<(i32, i32)> = Vec::new();
            for (from, to) in candidates {
                let cycle = would_create_cycle(from, to, lookup(&edges)).unwrap();
                if !cycle && !edges.contains(&(from, to)) {
                    edges.push((from, to));
                }
                prop_assert!(is_acyclic(&edges));
            }
        }
    }
}
