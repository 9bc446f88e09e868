//! Room-level tree handle with change notifications
//!
//! A [`Topology`] owns zero or one root node plus the arena behind it.
//! Every structural method emits exactly one [`TopologyEvent`] per call,
//! after the mutation has been fully applied, on a multicast broadcast
//! channel. Events are delivered in mutation order and carry the
//! parent-free snapshot of the resulting tree.

use tokio::sync::broadcast;

use crate::{NodeArena, NodeIdx, Side, SnapshotNode};

/// Buffered events per subscriber before lag kicks in
const EVENT_BUFFER: usize = 64;

/// What kind of structural mutation produced an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopologyChange {
    Inserted,
    Removed,
    RootReplaced,
}

/// Snapshot of the tree after one mutation
#[derive(Clone, Debug)]
pub struct TopologyEvent<K> {
    pub change: TopologyChange,
    /// Parent-free shape of the whole tree; `None` when it became empty
    pub snapshot: Option<SnapshotNode<K>>,
}

/// One member node together with its tree neighborhood
#[derive(Debug)]
pub struct MemberView<'a, K, V> {
    pub key: &'a K,
    pub value: &'a V,
    pub parent: Option<&'a K>,
    pub left: Option<&'a K>,
    pub right: Option<&'a K>,
}

/// The fan-out tree of one broadcast room
pub struct Topology<K, V> {
    arena: NodeArena<K, V>,
    root: Option<NodeIdx>,
    events: broadcast::Sender<TopologyEvent<K>>,
}

impl<K, V> Default for Topology<K, V>
where
    K: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Topology<K, V>
where
    K: Clone + PartialEq,
{
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Topology {
            arena: NodeArena::new(),
            root: None,
            events,
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<TopologyEvent<K>> {
        self.events.subscribe()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Membership test via depth-first search from the root
    pub fn contains(&self, key: &K) -> bool {
        self.root
            .map(|root| self.arena.find(root, key).is_some())
            .unwrap_or(false)
    }

    /// Insert a member: becomes the root of an empty tree, otherwise
    /// descends with the depth heuristic.
    pub fn insert(&mut self, key: K, value: V) {
        let node = self.arena.alloc(key, value);
        match self.root {
            None => self.root = Some(node),
            Some(root) => self.arena.insert_under(root, node),
        }
        self.emit(TopologyChange::Inserted);
    }

    /// Install a new root; the previous root's subtree is reinserted
    /// under it, preserving all existing members.
    pub fn set_root(&mut self, key: K, value: V) {
        let node = self.arena.alloc(key, value);
        let displaced = self.root.replace(node);
        if let Some(displaced) = displaced {
            self.arena.insert_under(node, displaced);
        }
        self.emit(TopologyChange::RootReplaced);
    }

    /// Remove a member by key, re-threading orphaned subtrees. Removing
    /// an absent key mutates nothing but still notifies.
    pub fn remove_by_key(&mut self, key: &K) -> Option<V> {
        let removed = match self.root {
            None => None,
            Some(root) if self.arena.key(root) == key => {
                let promoted = self.arena.detach(root, Side::Left);
                let spill = self.arena.detach(root, Side::Right);
                self.root = match (promoted, spill) {
                    (Some(left), Some(right)) => {
                        self.arena.insert_under(left, right);
                        Some(left)
                    }
                    (Some(left), None) => Some(left),
                    (None, right) => right,
                };
                Some(self.arena.release(root))
            }
            Some(root) => self.arena.remove_by_key(root, key),
        };
        self.emit(TopologyChange::Removed);
        removed.map(|(_, value)| value)
    }

    /// Neighbor keys and values a member may signal directly: left child,
    /// right child, parent.
    pub fn adjacent(&self, key: &K) -> Vec<(&K, &V)> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let Some(idx) = self.arena.find(root, key) else {
            return Vec::new();
        };
        self.arena
            .adjacent(idx)
            .into_iter()
            .map(|n| (self.arena.key(n), self.arena.value(n)))
            .collect()
    }

    /// In-order iteration over all members
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.root.into_iter().flat_map(move |root| {
            self.arena
                .iter(root)
                .map(move |idx| (self.arena.key(idx), self.arena.value(idx)))
        })
    }

    /// In-order iteration with each member's neighborhood attached
    pub fn members(&self) -> impl Iterator<Item = MemberView<'_, K, V>> {
        self.root.into_iter().flat_map(move |root| {
            self.arena.iter(root).map(move |idx| MemberView {
                key: self.arena.key(idx),
                value: self.arena.value(idx),
                parent: self.arena.parent(idx).map(|p| self.arena.key(p)),
                left: self.arena.child(idx, Side::Left).map(|c| self.arena.key(c)),
                right: self
                    .arena
                    .child(idx, Side::Right)
                    .map(|c| self.arena.key(c)),
            })
        })
    }

    /// Parent-free snapshot of the whole tree
    pub fn snapshot(&self) -> Option<SnapshotNode<K>> {
        self.root.map(|root| self.arena.snapshot(root))
    }

    fn emit(&self, change: TopologyChange) {
        // send fails only when nobody is subscribed
        let _ = self.events.send(TopologyEvent {
            change,
            snapshot: self.snapshot(),
        });
    }
}
