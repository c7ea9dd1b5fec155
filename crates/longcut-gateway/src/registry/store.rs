use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::node::RegistryNode;

/// One immutable generation of a registry.
pub struct Snapshot<N> {
    order: Vec<String>,
    nodes: HashMap<String, Arc<N>>,
}

impl<N> Clone for Snapshot<N> {
    fn clone(&self) -> Self {
        Self {
            order: self.order.clone(),
            nodes: self.nodes.clone(),
        }
    }
}

impl<N: RegistryNode> Snapshot<N> {
    fn empty() -> Self {
        Self {
            order: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<N>> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Names in insertion order.
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<N>> {
        self.order.iter().filter_map(|k| self.nodes.get(k))
    }

    pub fn rule_count(&self) -> usize {
        self.iter().map(|n| n.rules().len()).sum()
    }
}

/// Keyed store of named nodes, copy-on-write.
///
/// Re-adding a name replaces the node and keeps its position in `keys()`.
pub struct Registry<N> {
    current: RwLock<Arc<Snapshot<N>>>,
}

impl<N: RegistryNode> Default for Registry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: RegistryNode> Registry<N> {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty())),
        }
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = N>) -> Self {
        let reg = Self::new();
        for n in nodes {
            reg.put(n);
        }
        reg
    }

    /// Current generation; stays valid (and unchanged) while writers move on.
    pub fn snapshot(&self) -> Arc<Snapshot<N>> {
        Arc::clone(&self.current.read())
    }

    /// Insert or replace. Returns the replaced node.
    pub fn put(&self, node: N) -> Option<Arc<N>> {
        let name = node.name().to_string();
        self.write(|snap| {
            let prev = snap.nodes.insert(name.clone(), Arc::new(node));
            if prev.is_none() {
                snap.order.push(name);
            }
            prev
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<N>> {
        self.current.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<N>> {
        self.write(|snap| {
            let prev = snap.nodes.remove(name);
            if prev.is_some() {
                snap.order.retain(|k| k != name);
            }
            prev
        })
    }

    /// Replace an existing node with `f(current)`. No-op when absent.
    pub fn update(&self, name: &str, f: impl FnOnce(&N) -> N) -> Option<Arc<N>> {
        self.write(|snap| {
            let next = Arc::new(f(snap.nodes.get(name)?));
            snap.nodes.insert(name.to_string(), Arc::clone(&next));
            Some(next)
        })
    }

    /// Apply `f` to every node in one generation swap.
    pub fn update_all(&self, f: impl Fn(&N) -> N) {
        self.write(|snap| {
            for node in snap.nodes.values_mut() {
                let next = f(node);
                *node = Arc::new(next);
            }
        })
    }

    pub fn keys(&self) -> Vec<String> {
        self.current.read().keys().to_vec()
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write<R>(&self, f: impl FnOnce(&mut Snapshot<N>) -> R) -> R {
        let mut guard = self.current.write();
        let mut next = Snapshot::clone(&guard);
        let out = f(&mut next);
        *guard = Arc::new(next);
        out
    }
}
