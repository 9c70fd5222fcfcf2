//! Bounded graph traversals. The dependency graph may contain cycles, so
//! every walk carries a visited set and a depth bound.

use std::collections::BTreeSet;

use crate::domain::DependencyGraph;

/// Default traversal depth bound.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Transitive dependencies of `service`: everything it reaches by following
/// outbound edges, up to `max_depth` hops. The service itself is excluded.
pub fn downstream(graph: &DependencyGraph, service: &str, max_depth: usize) -> BTreeSet<String> {
    walk(graph, service, max_depth, Direction::Outbound)
}

/// Blast radius of `service`: everything that transitively depends on it,
/// following inbound edges up to `max_depth` hops. The service itself is
/// excluded.
pub fn upstream(graph: &DependencyGraph, service: &str, max_depth: usize) -> BTreeSet<String> {
    walk(graph, service, max_depth, Direction::Inbound)
}

enum Direction {
    Outbound,
    Inbound,
}

fn walk(
    graph: &DependencyGraph,
    start: &str,
    max_depth: usize,
    direction: Direction,
) -> BTreeSet<String> {
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut frontier: Vec<(String, usize)> = vec![(start.to_string(), 0)];

    while let Some((current, depth)) = frontier.pop() {
        if depth >= max_depth {
            continue;
        }
        let neighbors: Vec<String> = match direction {
            Direction::Outbound => graph
                .outbound(&current)
                .map(|e| e.target.clone())
                .collect(),
            Direction::Inbound => graph.inbound(&current).map(|e| e.source.clone()).collect(),
        };
        for neighbor in neighbors {
            if neighbor != start && visited.insert(neighbor.clone()) {
                frontier.push((neighbor, depth + 1));
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DepType, ResolvedDependency, ServiceIdentity};
    use std::collections::BTreeMap;

    fn graph(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut identities = BTreeMap::new();
        let mut resolved = Vec::new();
        for (source, target) in edges {
            for name in [source, target] {
                identities
                    .entry(name.to_string())
                    .or_insert_with(|| ServiceIdentity::discovered(name.to_string()));
            }
            resolved.push(ResolvedDependency {
                source: source.to_string(),
                target: target.to_string(),
                dep_type: DepType::Service,
                confidence: 0.9,
                providers: BTreeSet::from(["test".to_string()]),
                metadata: BTreeMap::new(),
            });
        }
        DependencyGraph {
            identities,
            edges: resolved,
            built_at: chrono::Utc::now(),
            providers_used: BTreeSet::from(["test".to_string()]),
        }
    }

    #[test]
    fn test_downstream_transitive() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "d")]);
        let deps = downstream(&g, "a", DEFAULT_MAX_DEPTH);
        assert_eq!(deps, BTreeSet::from(["b".into(), "c".into(), "d".into()]));
    }

    #[test]
    fn test_upstream_blast_radius() {
        let g = graph(&[("a", "b"), ("b", "c"), ("x", "c")]);
        let radius = upstream(&g, "c", DEFAULT_MAX_DEPTH);
        assert_eq!(radius, BTreeSet::from(["a".into(), "b".into(), "x".into()]));
    }

    #[test]
    fn test_cycle_terminates() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "a")]);
        let deps = downstream(&g, "a", DEFAULT_MAX_DEPTH);
        assert_eq!(deps, BTreeSet::from(["b".into(), "c".into()]));
    }

    #[test]
    fn test_depth_bound() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "d")]);
        let deps = downstream(&g, "a", 2);
        assert_eq!(deps, BTreeSet::from(["b".into(), "c".into()]));
    }

    #[test]
    fn test_self_loop_excluded() {
        let g = graph(&[("a", "a"), ("a", "b")]);
        let deps = downstream(&g, "a", DEFAULT_MAX_DEPTH);
        assert_eq!(deps, BTreeSet::from(["b".into()]));
    }
}
