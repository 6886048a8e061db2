//! Inspection taps for devtools frontends: the live component tree, per
//! instance render counts and timestamps, and a sanitizing serializer for
//! props.
//!
//! Nothing in here affects runtime behavior; the registry is bookkeeping
//! that components write into as they are created, rendered, and disposed.
//! For the reactive side of the picture (signal registry, effect edges), see
//! [`snapshot_runtime`](vellum_reactive::snapshot_runtime).

use serde::Serialize;
use slotmap::SlotMap;
use std::{
    cell::RefCell,
    time::{SystemTime, UNIX_EPOCH},
};

slotmap::new_key_type! {
    /// Stable identity of one component instance, for its whole lifetime.
    pub struct ComponentId;
}

/// Sanitized values deeper than this are replaced with a placeholder.
const MAX_PROP_DEPTH: usize = 32;

/// One component instance, as seen by devtools.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentNode {
    /// The component's declared name.
    pub name: String,
    /// How many times the instance's render closure has run.
    pub render_count: u64,
    /// Milliseconds since the Unix epoch of the most recent render.
    pub last_render_at: Option<u64>,
    /// Sanitized snapshot of the instance's props, or `Null` when the props
    /// type opted out of serialization.
    pub props: serde_json::Value,
    #[serde(skip)]
    parent: Option<ComponentId>,
    #[serde(skip)]
    children: Vec<ComponentId>,
}

/// A component subtree, nested for transport.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentTreeNode {
    /// The component's declared name.
    pub name: String,
    /// How many times the instance's render closure has run.
    pub render_count: u64,
    /// Milliseconds since the Unix epoch of the most recent render.
    pub last_render_at: Option<u64>,
    /// Sanitized props snapshot.
    pub props: serde_json::Value,
    /// Child instances, in creation order.
    pub children: Vec<ComponentTreeNode>,
}

#[derive(Default)]
struct DevtoolsRegistry {
    components: SlotMap<ComponentId, ComponentNode>,
    roots: Vec<ComponentId>,
}

thread_local! {
    static REGISTRY: RefCell<DevtoolsRegistry> = Default::default();
}

pub(crate) fn register_component(
    name: &str,
    parent: Option<ComponentId>,
    props: serde_json::Value,
) -> ComponentId {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        let id = registry.components.insert(ComponentNode {
            name: name.to_string(),
            render_count: 0,
            last_render_at: None,
            props,
            parent,
            children: Vec::new(),
        });
        match parent.and_then(|p| registry.components.get_mut(p)) {
            Some(parent) => parent.children.push(id),
            None => registry.roots.push(id),
        }
        id
    })
}

pub(crate) fn unregister_component(id: ComponentId) {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        let parent = match registry.components.remove(id) {
            Some(node) => node.parent,
            None => return,
        };
        match parent.and_then(|p| registry.components.get_mut(p)) {
            Some(parent) => parent.children.retain(|child| *child != id),
            None => registry.roots.retain(|root| *root != id),
        }
    })
}

pub(crate) fn record_render(id: ComponentId) {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        if let Some(node) = registry.components.get_mut(id) {
            node.render_count += 1;
            node.last_render_at = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .ok()
                .map(|d| d.as_millis() as u64);
        }
    })
}

/// Returns a snapshot of one component instance, or `None` if it has been
/// disposed.
pub fn component_node(id: ComponentId) -> Option<ComponentNode> {
    REGISTRY.with(|registry| registry.borrow().components.get(id).cloned())
}

/// Returns the current component tree, one entry per root instance.
pub fn component_tree() -> Vec<ComponentTreeNode> {
    REGISTRY.with(|registry| {
        let registry = registry.borrow();
        registry
            .roots
            .iter()
            .filter_map(|root| build_tree(&registry, *root))
            .collect()
    })
}

fn build_tree(
    registry: &DevtoolsRegistry,
    id: ComponentId,
) -> Option<ComponentTreeNode> {
    let node = registry.components.get(id)?;
    Some(ComponentTreeNode {
        name: node.name.clone(),
        render_count: node.render_count,
        last_render_at: node.last_render_at,
        props: node.props.clone(),
        children: node
            .children
            .iter()
            .filter_map(|child| build_tree(registry, *child))
            .collect(),
    })
}

/// Empties the component registry. Tests and hot-reload paths call this
/// between runs; live instances keep working but disappear from the tree.
pub fn clear_devtools() {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        registry.components.clear();
        registry.roots.clear();
    })
}

/// Bounds a serialized props value for transport: anything nested deeper
/// than the depth cap is replaced with a `{"$type": "truncated"}` marker.
/// Values that would recurse forever (cyclic structures reached through a
/// custom `Serialize` impl) surface as this marker instead of hanging the
/// inspector.
pub fn sanitize(value: serde_json::Value) -> serde_json::Value {
    sanitize_at(value, 0)
}

fn sanitize_at(value: serde_json::Value, depth: usize) -> serde_json::Value {
    use serde_json::Value;

    if depth >= MAX_PROP_DEPTH {
        return serde_json::json!({ "$type": "truncated" });
    }

    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| sanitize_at(item, depth + 1))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, item)| (key, sanitize_at(item, depth + 1)))
                .collect(),
        ),
        scalar => scalar,
    }
}
