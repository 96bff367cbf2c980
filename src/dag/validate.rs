// src/dag/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::graph::{NodeId, TaskGraph};
use crate::errors::{InitdagError, Result};

/// Validate a freshly built graph before anything runs.
///
/// Checks, in order:
/// - the dependency graph is acyclic;
/// - no synchronous task directly depends on a deferred synchronous task
///   (the caller's wait latch could otherwise never open on a correct
///   schedule).
pub(crate) fn validate<C>(graph: &TaskGraph<C>) -> Result<()> {
    validate_acyclic(graph)?;
    validate_no_sync_on_deferred(graph)?;
    Ok(())
}

fn validate_acyclic<C>(graph: &TaskGraph<C>) -> Result<()> {
    // Mirror the arena in a petgraph map, edge direction: dependency -> dependent.
    let mut dg: DiGraphMap<usize, ()> = DiGraphMap::new();

    for id in graph.ids() {
        dg.add_node(id.0);
    }
    for id in graph.ids() {
        for &dep in &graph.node(id).deps {
            dg.add_edge(dep.0, id.0, ());
        }
    }

    // A topological sort fails exactly when there is a cycle.
    match toposort(&dg, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let start = NodeId(cycle.node_id());
            Err(InitdagError::DagCycle(cycle_path(graph, start)))
        }
    }
}

/// Reconstruct one offending cycle through `start` for the error message,
/// walking dependency -> dependent edges with an explicit path stack.
fn cycle_path<C>(graph: &TaskGraph<C>, start: NodeId) -> String {
    let mut path = vec![start];
    let mut visited = HashSet::new();
    visited.insert(start);

    if walk_back_to(graph, start, start, &mut path, &mut visited) {
        let mut names: Vec<&str> = path
            .iter()
            .map(|&id| graph.node(id).meta.name.as_str())
            .collect();
        names.push(graph.node(start).meta.name.as_str());
        names.join(" -> ")
    } else {
        graph.node(start).meta.name.clone()
    }
}

fn walk_back_to<C>(
    graph: &TaskGraph<C>,
    current: NodeId,
    target: NodeId,
    path: &mut Vec<NodeId>,
    visited: &mut HashSet<NodeId>,
) -> bool {
    for &next in &graph.node(current).after {
        if next == target {
            return true;
        }
        if visited.insert(next) {
            path.push(next);
            if walk_back_to(graph, next, target, path, visited) {
                return true;
            }
            path.pop();
        }
    }
    false
}

fn validate_no_sync_on_deferred<C>(graph: &TaskGraph<C>) -> Result<()> {
    for id in graph.ids() {
        let node = graph.node(id);
        if node.meta.mode.is_async() {
            continue;
        }
        for &dep in &node.deps {
            let before = graph.node(dep);
            if !before.meta.mode.is_async() && before.meta.deferred {
                return Err(InitdagError::SyncOnDeferred {
                    task: node.meta.name.clone(),
                    dependency: before.meta.name.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::testing::StubTask;

    #[test]
    fn acyclic_graph_passes() {
        let graph = TaskGraph::build(vec![
            StubTask::new("a").build(),
            StubTask::new("b").after("a").build(),
            StubTask::new("c").after("a").after("b").build(),
        ])
        .unwrap();
        validate(&graph).unwrap();
    }

    #[test]
    fn three_task_cycle_is_reported_with_its_path() {
        let graph = TaskGraph::build(vec![
            StubTask::new("a").after("c").build(),
            StubTask::new("b").after("a").build(),
            StubTask::new("c").after("b").build(),
        ])
        .unwrap();

        let err = validate(&graph).unwrap_err();
        match err {
            InitdagError::DagCycle(path) => {
                // Every participant shows up, and the path closes on itself.
                assert!(path.contains("a") && path.contains("b") && path.contains("c"));
                let first = path.split(" -> ").next().unwrap();
                let last = path.rsplit(" -> ").next().unwrap();
                assert_eq!(first, last);
            }
            other => panic!("expected DagCycle, got {other:?}"),
        }
    }

    #[test]
    fn two_task_cycle_is_rejected() {
        let graph = TaskGraph::build(vec![
            StubTask::new("a").after("b").build(),
            StubTask::new("b").after("a").build(),
        ])
        .unwrap();
        assert!(matches!(
            validate(&graph).unwrap_err(),
            InitdagError::DagCycle(_)
        ));
    }

    #[test]
    fn sync_task_cannot_depend_on_deferred_sync_task() {
        let graph = TaskGraph::build(vec![
            StubTask::new("late").deferred().build(),
            StubTask::new("eager").after("late").build(),
        ])
        .unwrap();

        let err = validate(&graph).unwrap_err();
        assert!(matches!(
            err,
            InitdagError::SyncOnDeferred { task, dependency }
                if task == "eager" && dependency == "late"
        ));
    }

    #[test]
    fn sync_task_may_depend_on_deferred_async_task() {
        let graph = TaskGraph::build(vec![
            StubTask::new("late").deferred().asynchronous().build(),
            StubTask::new("eager").after("late").build(),
        ])
        .unwrap();
        validate(&graph).unwrap();
    }

    #[test]
    fn async_task_may_depend_on_deferred_sync_task() {
        let graph = TaskGraph::build(vec![
            StubTask::new("late").deferred().build(),
            StubTask::new("bg").after("late").asynchronous().build(),
        ])
        .unwrap();
        validate(&graph).unwrap();
    }
}
