// src/dag/graph.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::errors::{InitdagError, Result};
use crate::task::{InitTask, TaskMeta};
use crate::types::TaskMode;

/// Index of a task in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

/// Lifecycle of a task within one run.
///
/// `Pending` covers construction, before edges are resolved. Asynchronous
/// tasks additionally pass through a wrapper-internal awaiting-signal phase
/// between body return and `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskState {
    Pending,
    Waiting,
    Submitted,
    Running,
    Completed,
}

/// Arena node: one task plus its resolved edges.
pub(crate) struct Node<C> {
    pub(crate) meta: TaskMeta,
    /// Body of the task; `None` for the synthetic root.
    pub(crate) task: Option<Arc<dyn InitTask<C>>>,
    /// Resolved declared dependencies (root edges excluded).
    pub(crate) deps: Vec<NodeId>,
    /// Live set of not-yet-finished dependencies; a task becomes ready
    /// exactly when this empties. Mutated only under the coordinator lock.
    pub(crate) pending_before: HashSet<NodeId>,
    /// Tasks that list this one as a dependency; notified on completion.
    pub(crate) after: Vec<NodeId>,
    pub(crate) state: TaskState,
}

const ROOT_NAME: &str = "<root>";

/// Dependency graph for a single run.
///
/// Tasks live in an arena indexed by [`NodeId`]; edges are index sets, so
/// tasks never reference each other directly. A synthetic root with a no-op
/// body is appended last and wired to every dependency-free task, giving the
/// traversal a single entry point. The graph owns its tasks for the duration
/// of one run and is discarded afterwards.
pub(crate) struct TaskGraph<C> {
    nodes: Vec<Node<C>>,
    root: NodeId,
}

impl<C> std::fmt::Debug for TaskGraph<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("node_count", &self.nodes.len())
            .field("root", &self.root)
            .finish()
    }
}

impl<C> TaskGraph<C> {
    /// Build the graph from task descriptors: resolve every declared
    /// dependency identity to an arena index, populate forward/backward
    /// edges and inject the root.
    pub(crate) fn build(tasks: Vec<Arc<dyn InitTask<C>>>) -> Result<Self> {
        let task_count = tasks.len();

        let mut index: HashMap<String, NodeId> = HashMap::with_capacity(task_count);
        for (i, task) in tasks.iter().enumerate() {
            let name = task.name().to_string();
            if name.is_empty() {
                return Err(InitdagError::ConfigError(
                    "task name must not be empty".to_string(),
                ));
            }
            if index.insert(name.clone(), NodeId(i)).is_some() {
                return Err(InitdagError::ConfigError(format!(
                    "duplicate task name '{name}'"
                )));
            }
        }

        let mut nodes: Vec<Node<C>> = tasks
            .into_iter()
            .map(|task| Node {
                meta: TaskMeta {
                    name: task.name().to_string(),
                    mode: task.mode(),
                    deferred: task.deferred(),
                },
                task: Some(task),
                deps: Vec::new(),
                pending_before: HashSet::new(),
                after: Vec::new(),
                state: TaskState::Pending,
            })
            .collect();

        let root = NodeId(task_count);
        nodes.push(Node {
            meta: TaskMeta {
                name: ROOT_NAME.to_string(),
                mode: TaskMode::Sync,
                deferred: false,
            },
            task: None,
            deps: Vec::new(),
            pending_before: HashSet::new(),
            after: Vec::new(),
            state: TaskState::Pending,
        });

        for id in 0..task_count {
            let task = match &nodes[id].task {
                Some(task) => Arc::clone(task),
                None => continue,
            };

            for dep_name in task.dependencies() {
                let Some(&dep) = index.get(&dep_name) else {
                    return Err(InitdagError::UnknownDependency {
                        task: nodes[id].meta.name.clone(),
                        dependency: dep_name,
                    });
                };
                if dep.0 == id {
                    return Err(InitdagError::SelfDependency(nodes[id].meta.name.clone()));
                }
                // Duplicate declarations collapse to a single edge.
                if nodes[id].pending_before.insert(dep) {
                    nodes[id].deps.push(dep);
                    nodes[dep.0].after.push(NodeId(id));
                }
            }

            // Dependency-free tasks hang off the root so that starting the
            // root transitively starts the whole graph.
            if nodes[id].pending_before.is_empty() {
                nodes[id].pending_before.insert(root);
                nodes[root.0].after.push(NodeId(id));
            }
        }

        for node in &mut nodes {
            node.state = TaskState::Waiting;
        }

        Ok(Self { nodes, root })
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn is_root(&self, id: NodeId) -> bool {
        id == self.root
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node<C> {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<C> {
        &mut self.nodes[id.0]
    }

    /// All node ids, root included.
    pub(crate) fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Total vertex count, root included.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Counts of (synchronous, asynchronous) tasks over the input set,
    /// excluding the synthetic root. Feeds the pool sizing policy.
    pub(crate) fn mode_counts(&self) -> (usize, usize) {
        let mut sync_count = 0;
        let mut async_count = 0;
        for id in self.ids() {
            if self.is_root(id) {
                continue;
            }
            if self.node(id).meta.mode.is_async() {
                async_count += 1;
            } else {
                sync_count += 1;
            }
        }
        (sync_count, async_count)
    }

    /// Number of tasks the caller waits for: every non-deferred vertex, root
    /// included (the root always completes, so including it only shifts the
    /// latch count by one in lockstep).
    pub(crate) fn waiter_count(&self) -> usize {
        self.ids()
            .filter(|&id| !self.node(id).meta.deferred)
            .count()
    }
}
