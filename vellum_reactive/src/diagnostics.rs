use crate::{
    node::{ReactiveNodeState, ReactiveNodeType},
    runtime::{with_runtime, RuntimeId},
};
use serde::Serialize;

/// What kind of reactive node a [`NodeSnapshot`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A writable source.
    Signal,
    /// A cached derivation.
    Memo,
    /// A scheduled consumer.
    Effect,
}

/// A point-in-time description of one reactive node, for devtools.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    /// Debug form of the node's arena key. Stable for the node's lifetime.
    pub id: String,
    /// The node kind.
    pub kind: NodeKind,
    /// The node's propagation state (`"clean"`, `"check"`, or `"dirty"`).
    pub state: &'static str,
    /// Number of nodes currently subscribed to this one.
    pub subscribers: usize,
    /// Number of nodes this one currently depends on.
    pub sources: usize,
}

/// A point-in-time description of a reactive runtime: its signal registry
/// and effect/memo dependency counts. This is the tap a devtools frontend
/// reads; it is serializable and carries no handles into the graph.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeSnapshot {
    /// One entry per live node.
    pub nodes: Vec<NodeSnapshot>,
    /// Number of live scopes.
    pub scopes: usize,
    /// Number of effects queued but not yet flushed.
    pub pending_effects: usize,
}

impl RuntimeSnapshot {
    /// Count of live nodes of the given kind.
    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }
}

/// Takes a snapshot of the given runtime, or `None` if it has been disposed.
pub fn snapshot_runtime(runtime: RuntimeId) -> Option<RuntimeSnapshot> {
    with_runtime(runtime, |runtime| {
        let nodes = runtime.nodes.borrow();
        let subscribers = runtime.node_subscribers.borrow();
        let sources = runtime.node_sources.borrow();

        let nodes = nodes
            .iter()
            .map(|(id, node)| NodeSnapshot {
                id: format!("{id:?}"),
                kind: match node.node_type {
                    ReactiveNodeType::Signal => NodeKind::Signal,
                    ReactiveNodeType::Memo { .. } => NodeKind::Memo,
                    ReactiveNodeType::Effect { .. } => NodeKind::Effect,
                },
                state: match node.state {
                    ReactiveNodeState::Clean => "clean",
                    ReactiveNodeState::Check => "check",
                    ReactiveNodeState::Dirty
                    | ReactiveNodeState::DirtyMarked => "dirty",
                },
                subscribers: subscribers
                    .get(id)
                    .map(|subs| subs.borrow().len())
                    .unwrap_or_default(),
                sources: sources
                    .get(id)
                    .map(|sources| sources.borrow().len())
                    .unwrap_or_default(),
            })
            .collect();

        RuntimeSnapshot {
            nodes,
            scopes: runtime.scopes.borrow().len(),
            pending_effects: runtime.pending_effects.borrow().len(),
        }
    })
    .ok()
}
