//! Dependency resolution: turns a set of step ids into a deterministic order.
//!
//! The requested steps become a `petgraph` graph with an edge from each
//! prerequisite to its dependent. Ordering peels off layers of steps whose
//! prerequisites are all placed, sorting each layer by id.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::errors::WorkflowError;

/// Step id -> prerequisite step ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMap {
    edges: BTreeMap<String, Vec<String>>,
}

impl DependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed dependencies of the five pipeline steps.
    pub fn standard() -> Self {
        Self::new()
            .with("step1", &[])
            .with("step2", &[])
            .with("step3", &["step2"])
            .with("step4", &["step3"])
            .with("step5", &["step1", "step2", "step4"])
    }

    /// Builder-style insert.
    pub fn with(mut self, step_id: &str, prerequisites: &[&str]) -> Self {
        self.insert(step_id, prerequisites.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn insert(&mut self, step_id: impl Into<String>, prerequisites: Vec<String>) {
        self.edges.insert(step_id.into(), prerequisites);
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.edges.contains_key(step_id)
    }

    /// Prerequisites of a step (empty for unknown ids).
    pub fn prerequisites(&self, step_id: &str) -> &[String] {
        self.edges.get(step_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Copy keeping only edges between the given steps.
    pub fn restricted_to(&self, steps: &[String]) -> Self {
        let keep: HashSet<&str> = steps.iter().map(String::as_str).collect();
        let edges = self
            .edges
            .iter()
            .filter(|(id, _)| keep.contains(id.as_str()))
            .map(|(id, deps)| {
                let deps = deps
                    .iter()
                    .filter(|d| keep.contains(d.as_str()))
                    .cloned()
                    .collect();
                (id.clone(), deps)
            })
            .collect();
        Self { edges }
    }

    /// Drop unknown ids and, unless `skip_dependencies`, every step with a
    /// prerequisite outside the surviving set. Dropping repeats until the set
    /// is closed, so a dependent of a dropped step goes too. Keeps input
    /// order, removes duplicates.
    pub fn filter_requested(&self, requested: &[String], skip_dependencies: bool) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut valid: Vec<String> = Vec::new();
        for step_id in requested {
            if !seen.insert(step_id.as_str()) {
                continue;
            }
            if !self.contains(step_id) {
                tracing::warn!("Step {} is not registered, skipping", step_id);
                continue;
            }
            valid.push(step_id.clone());
        }

        if skip_dependencies {
            return valid;
        }

        loop {
            let kept: HashSet<String> = valid.iter().cloned().collect();
            let before = valid.len();
            valid.retain(|step_id| {
                let missing: Vec<&str> = self
                    .prerequisites(step_id)
                    .iter()
                    .map(String::as_str)
                    .filter(|d| !kept.contains(*d))
                    .collect();
                if missing.is_empty() {
                    return true;
                }
                tracing::warn!(
                    "Step {} is missing dependencies [{}], skipping",
                    step_id,
                    missing.join(", ")
                );
                false
            });
            if valid.len() == before {
                return valid;
            }
        }
    }

    /// Order `steps` so every prerequisite precedes its dependent.
    ///
    /// Each round appends the ready set sorted by id. A prerequisite that is
    /// not among `steps` can never become ready, so its dependents are
    /// reported as unresolved exactly like members of a cycle.
    pub fn resolve(&self, steps: &[String]) -> Result<Vec<String>, WorkflowError> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        for step in steps {
            nodes
                .entry(step.as_str())
                .or_insert_with(|| graph.add_node(step.as_str()));
        }

        // Steps waiting on something outside the set
        let mut blocked: HashSet<NodeIndex> = HashSet::new();
        for (&step_id, &node) in &nodes {
            for dep in self.prerequisites(step_id) {
                match nodes.get(dep.as_str()) {
                    Some(&from) => {
                        graph.add_edge(from, node, ());
                    }
                    None => {
                        blocked.insert(node);
                    }
                }
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            tracing::debug!("Dependency cycle through {}", graph[cycle.node_id()]);
        }

        let mut remaining: Vec<NodeIndex> = graph.node_indices().collect();
        let mut placed: HashSet<NodeIndex> = HashSet::new();
        let mut ordered: Vec<String> = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let mut ready: Vec<NodeIndex> = remaining
                .iter()
                .copied()
                .filter(|node| {
                    !blocked.contains(node)
                        && graph
                            .neighbors_directed(*node, Direction::Incoming)
                            .all(|dep| placed.contains(&dep))
                })
                .collect();

            if ready.is_empty() {
                let mut unresolved: Vec<String> =
                    remaining.iter().map(|node| graph[*node].to_string()).collect();
                unresolved.sort();
                tracing::error!("Cannot order steps, unresolved: {}", unresolved.join(", "));
                return Err(WorkflowError::CycleDetected { unresolved });
            }

            ready.sort_unstable_by_key(|node| graph[*node]);
            remaining.retain(|node| !ready.contains(node));
            for node in ready {
                placed.insert(node);
                ordered.push(graph[node].to_string());
            }
        }

        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn all_five() -> Vec<String> {
        ids(&["step1", "step2", "step3", "step4", "step5"])
    }

    fn assert_respects(map: &DependencyMap, requested: &[String], order: &[String]) {
        assert_eq!(order.len(), requested.len());
        for step in requested {
            assert_eq!(order.iter().filter(|s| *s == step).count(), 1, "{} once", step);
        }
        for (pos, step) in order.iter().enumerate() {
            for dep in map.prerequisites(step) {
                if let Some(dep_pos) = order.iter().position(|s| s == dep) {
                    assert!(dep_pos < pos, "{} must precede {}", dep, step);
                }
            }
        }
    }

    #[test]
    fn standard_order() {
        let order = DependencyMap::standard().resolve(&all_five()).unwrap();
        assert_eq!(order, all_five());
    }

    #[test]
    fn order_does_not_depend_on_request_order() {
        let map = DependencyMap::standard();
        let order = map
            .resolve(&ids(&["step5", "step4", "step3", "step2", "step1"]))
            .unwrap();
        assert_eq!(order, all_five());
    }

    #[test]
    fn cycle_reports_every_unresolved_step() {
        let map = DependencyMap::new().with("b", &["a"]).with("a", &["b"]).with("c", &[]);
        let err = map.resolve(&ids(&["b", "c", "a"])).unwrap_err();
        match err {
            WorkflowError::CycleDetected { unresolved } => assert_eq!(unresolved, ids(&["a", "b"])),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_prerequisite_is_unresolved_not_dropped() {
        let map = DependencyMap::standard();
        let err = map.resolve(&ids(&["step1", "step3"])).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::CycleDetected { ref unresolved } if unresolved == &ids(&["step3"])
        ));
    }

    #[test]
    fn every_subset_resolves_in_valid_order() {
        let map = DependencyMap::standard();
        let all = all_five();
        for mask in 0u32..(1 << all.len()) {
            let subset: Vec<String> = all
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, s)| s.clone())
                .collect();

            // With the dependency check, filtering leaves a closed set
            let filtered = map.filter_requested(&subset, false);
            let order = map.resolve(&filtered).unwrap();
            assert_respects(&map, &filtered, &order);

            // Without it, edges outside the subset are ignored
            let order = map.restricted_to(&subset).resolve(&subset).unwrap();
            assert_respects(&map, &subset, &order);
        }
    }

    #[test]
    fn filter_drops_unknown_missing_and_duplicates() {
        let map = DependencyMap::standard();
        let requested = ids(&["step3", "step9", "step1", "step1", "step2"]);

        assert_eq!(map.filter_requested(&requested, false), ids(&["step3", "step1", "step2"]));
        assert_eq!(map.filter_requested(&ids(&["step4", "step2"]), false), ids(&["step2"]));
        assert_eq!(
            map.filter_requested(&ids(&["step4", "step2"]), true),
            ids(&["step4", "step2"])
        );
    }

    #[test]
    fn filter_cascades_through_dropped_steps() {
        let map = DependencyMap::standard();

        // step3 lacks step2; step4 then lacks step3
        assert!(map.filter_requested(&ids(&["step3", "step4"]), false).is_empty());
        assert_eq!(
            map.filter_requested(&ids(&["step1", "step3", "step4", "step5"]), false),
            ids(&["step1"])
        );
        assert_eq!(
            map.filter_requested(&ids(&["step4", "step3", "step2"]), false),
            ids(&["step4", "step3", "step2"])
        );
    }

    #[test]
    fn duplicate_requests_resolve_once() {
        let order = DependencyMap::standard()
            .resolve(&ids(&["step2", "step2", "step1"]))
            .unwrap();
        assert_eq!(order, ids(&["step1", "step2"]));
    }

    #[test]
    fn restricted_map_drops_outside_edges() {
        let map = DependencyMap::standard().restricted_to(&ids(&["step4", "step5"]));
        assert!(!map.contains("step1"));
        assert!(map.prerequisites("step4").is_empty());
        assert_eq!(map.prerequisites("step5"), ids(&["step4"]).as_slice());
    }
}
