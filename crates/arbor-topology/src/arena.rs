//! Index-addressed node storage for the fan-out tree
//!
//! A node is owned by exactly one parent slot (or by the tree root
//! handle). Attaching a node that still has a parent is a programming
//! error and panics; the higher layers only ever attach freshly detached
//! subtrees or newly allocated leaves.

use std::fmt;

/// Index of a node slot within a [`NodeArena`]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIdx(u32);

impl fmt::Debug for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeIdx({})", self.0)
    }
}

/// Child position under a parent node
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Side {
    Left,
    Right,
}

/// Parent-free projection of a subtree, safe to hand across the network
/// boundary (no back-references, no mutators)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotNode<K> {
    pub key: K,
    pub left: Option<Box<SnapshotNode<K>>>,
    pub right: Option<Box<SnapshotNode<K>>>,
}

struct Slot<K, V> {
    key: K,
    value: V,
    parent: Option<NodeIdx>,
    left: Option<NodeIdx>,
    right: Option<NodeIdx>,
    /// Cached depth to the nearest open slot in the left subtree.
    /// `None` means invalidated; recomputed on next read.
    left_depth: Option<u32>,
    /// Cached depth to the nearest open slot in the right subtree.
    right_depth: Option<u32>,
}

/// Slab of tree nodes with free-list reuse
pub struct NodeArena<K, V> {
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<u32>,
    len: usize,
}

impl<K, V> Default for NodeArena<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> NodeArena<K, V> {
    pub fn new() -> Self {
        NodeArena {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocate a new orphan leaf
    pub fn alloc(&mut self, key: K, value: V) -> NodeIdx {
        let slot = Slot {
            key,
            value,
            parent: None,
            left: None,
            right: None,
            left_depth: None,
            right_depth: None,
        };
        self.len += 1;
        match self.free.pop() {
            Some(i) => {
                debug_assert!(self.slots[i as usize].is_none());
                self.slots[i as usize] = Some(slot);
                NodeIdx(i)
            }
            None => {
                self.slots.push(Some(slot));
                NodeIdx(self.slots.len() as u32 - 1)
            }
        }
    }

    /// Release a fully detached leaf, returning its key/value pair
    pub fn release(&mut self, idx: NodeIdx) -> (K, V) {
        let slot = self.slots[idx.0 as usize]
            .take()
            .expect("released slot must be live");
        assert!(
            slot.parent.is_none() && slot.left.is_none() && slot.right.is_none(),
            "released node must be a detached leaf"
        );
        self.free.push(idx.0);
        self.len -= 1;
        (slot.key, slot.value)
    }

    fn slot(&self, idx: NodeIdx) -> &Slot<K, V> {
        self.slots[idx.0 as usize]
            .as_ref()
            .expect("node index must be live")
    }

    fn slot_mut(&mut self, idx: NodeIdx) -> &mut Slot<K, V> {
        self.slots[idx.0 as usize]
            .as_mut()
            .expect("node index must be live")
    }

    pub fn key(&self, idx: NodeIdx) -> &K {
        &self.slot(idx).key
    }

    pub fn value(&self, idx: NodeIdx) -> &V {
        &self.slot(idx).value
    }

    pub fn parent(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.slot(idx).parent
    }

    pub fn child(&self, idx: NodeIdx, side: Side) -> Option<NodeIdx> {
        match side {
            Side::Left => self.slot(idx).left,
            Side::Right => self.slot(idx).right,
        }
    }

    /// Left child, right child, and parent: exactly the set of nodes this
    /// node may signal directly.
    pub fn adjacent(&self, idx: NodeIdx) -> Vec<NodeIdx> {
        let slot = self.slot(idx);
        let mut out = Vec::with_capacity(3);
        if let Some(left) = slot.left {
            out.push(left);
        }
        if let Some(right) = slot.right {
            out.push(right);
        }
        if let Some(parent) = slot.parent {
            out.push(parent);
        }
        out
    }

    /// Attach an orphan subtree as a direct child.
    ///
    /// Panics if the child already has a parent, the slot is occupied, or
    /// the attachment would close a cycle.
    pub fn attach(&mut self, parent: NodeIdx, side: Side, child: NodeIdx) {
        assert_ne!(parent, child, "cannot attach a node to itself");
        assert!(
            self.slot(child).parent.is_none(),
            "attached node must be an orphan"
        );
        assert!(
            self.child(parent, side).is_none(),
            "child slot is already occupied"
        );
        debug_assert!(
            !self.is_ancestor(child, parent),
            "attachment would create a cycle"
        );

        match side {
            Side::Left => self.slot_mut(parent).left = Some(child),
            Side::Right => self.slot_mut(parent).right = Some(child),
        }
        self.slot_mut(child).parent = Some(parent);
        self.invalidate_upward(child);
    }

    /// Detach and return a child as a freshly orphaned subtree
    pub fn detach(&mut self, parent: NodeIdx, side: Side) -> Option<NodeIdx> {
        let child = match side {
            Side::Left => self.slot_mut(parent).left.take(),
            Side::Right => self.slot_mut(parent).right.take(),
        }?;
        self.slot_mut(child).parent = None;
        match side {
            Side::Left => self.slot_mut(parent).left_depth = None,
            Side::Right => self.slot_mut(parent).right_depth = None,
        }
        self.invalidate_upward(parent);
        Some(child)
    }

    /// Insert an orphan node somewhere under `at`, descending into the
    /// subtree whose nearest open slot is shallowest (left on ties).
    pub fn insert_under(&mut self, at: NodeIdx, node: NodeIdx) {
        assert_ne!(at, node, "cannot insert a node into itself");
        assert!(
            self.slot(node).parent.is_none(),
            "inserted node must be an orphan"
        );

        let mut cur = at;
        loop {
            let left_depth = self.open_depth(cur, Side::Left);
            let right_depth = self.open_depth(cur, Side::Right);
            let side = if left_depth <= right_depth {
                Side::Left
            } else {
                Side::Right
            };
            match self.child(cur, side) {
                None => {
                    self.attach(cur, side, node);
                    return;
                }
                Some(next) => cur = next,
            }
        }
    }

    /// Remove the node with the given key from the subtree under `at`.
    ///
    /// The removed node's left subtree is promoted into the vacated slot
    /// as-is; its right subtree is reinserted through the balancing
    /// insert. An absent key is a no-op.
    pub fn remove_by_key(&mut self, at: NodeIdx, key: &K) -> Option<(K, V)>
    where
        K: PartialEq,
    {
        for side in [Side::Left, Side::Right] {
            let Some(child) = self.child(at, side) else {
                continue;
            };
            if self.slot(child).key != *key {
                continue;
            }
            self.detach(at, side);
            let promoted = self.detach(child, Side::Left);
            let spill = self.detach(child, Side::Right);
            if let Some(promoted) = promoted {
                self.attach(at, side, promoted);
            }
            if let Some(spill) = spill {
                self.insert_under(at, spill);
            }
            return Some(self.release(child));
        }

        if let Some(left) = self.child(at, Side::Left) {
            if let Some(removed) = self.remove_by_key(left, key) {
                return Some(removed);
            }
        }
        if let Some(right) = self.child(at, Side::Right) {
            if let Some(removed) = self.remove_by_key(right, key) {
                return Some(removed);
            }
        }
        None
    }

    /// Depth-first, left-biased search for a key
    pub fn find(&self, at: NodeIdx, key: &K) -> Option<NodeIdx>
    where
        K: PartialEq,
    {
        if self.slot(at).key == *key {
            return Some(at);
        }
        if let Some(left) = self.child(at, Side::Left) {
            if let Some(found) = self.find(left, key) {
                return Some(found);
            }
        }
        if let Some(right) = self.child(at, Side::Right) {
            if let Some(found) = self.find(right, key) {
                return Some(found);
            }
        }
        None
    }

    /// Lazy in-order traversal (left, self, right) of the subtree at `at`
    pub fn iter(&self, at: NodeIdx) -> InOrder<'_, K, V> {
        InOrder {
            arena: self,
            stack: Vec::new(),
            descend: Some(at),
        }
    }

    /// Parent-free projection of the subtree at `at`
    pub fn snapshot(&self, at: NodeIdx) -> SnapshotNode<K>
    where
        K: Clone,
    {
        SnapshotNode {
            key: self.slot(at).key.clone(),
            left: self
                .child(at, Side::Left)
                .map(|left| Box::new(self.snapshot(left))),
            right: self
                .child(at, Side::Right)
                .map(|right| Box::new(self.snapshot(right))),
        }
    }

    /// Depth to the nearest open slot on one side; 0 if that side is
    /// empty. Cached per node, recomputed lazily after invalidation.
    fn open_depth(&mut self, idx: NodeIdx, side: Side) -> u32 {
        let slot = self.slot(idx);
        let (cached, child) = match side {
            Side::Left => (slot.left_depth, slot.left),
            Side::Right => (slot.right_depth, slot.right),
        };
        if let Some(depth) = cached {
            return depth;
        }
        let Some(child) = child else {
            return 0;
        };
        let depth = 1 + self
            .open_depth(child, Side::Left)
            .min(self.open_depth(child, Side::Right));
        match side {
            Side::Left => self.slot_mut(idx).left_depth = Some(depth),
            Side::Right => self.slot_mut(idx).right_depth = Some(depth),
        }
        depth
    }

    /// Clear cached depths on every ancestor whose subtree changed
    fn invalidate_upward(&mut self, from: NodeIdx) {
        let mut child = from;
        while let Some(parent) = self.slot(child).parent {
            if self.slot(parent).left == Some(child) {
                self.slot_mut(parent).left_depth = None;
            } else {
                self.slot_mut(parent).right_depth = None;
            }
            child = parent;
        }
    }

    fn is_ancestor(&self, candidate: NodeIdx, of: NodeIdx) -> bool {
        let mut cur = Some(of);
        while let Some(idx) = cur {
            if idx == candidate {
                return true;
            }
            cur = self.slot(idx).parent;
        }
        false
    }
}

/// In-order iterator over a subtree. Finite and not restartable: take a
/// fresh one for each pass.
pub struct InOrder<'a, K, V> {
    arena: &'a NodeArena<K, V>,
    stack: Vec<NodeIdx>,
    descend: Option<NodeIdx>,
}

impl<'a, K, V> Iterator for InOrder<'a, K, V> {
    type Item = NodeIdx;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(idx) = self.descend {
            self.stack.push(idx);
            self.descend = self.arena.child(idx, Side::Left);
        }
        let current = self.stack.pop()?;
        self.descend = self.arena.child(current, Side::Right);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build<const N: usize>(keys: [&str; N]) -> (NodeArena<String, ()>, NodeIdx) {
        let mut arena = NodeArena::new();
        let root = arena.alloc(keys[0].to_owned(), ());
        for key in &keys[1..] {
            let node = arena.alloc((*key).to_owned(), ());
            arena.insert_under(root, node);
        }
        (arena, root)
    }

    fn child_key(arena: &NodeArena<String, ()>, idx: NodeIdx, side: Side) -> Option<String> {
        arena.child(idx, side).map(|c| arena.key(c).clone())
    }

    #[test]
    fn test_insert_fills_level_order() {
        let (arena, root) = build(["a", "b", "c", "d", "e", "f"]);

        assert_eq!(child_key(&arena, root, Side::Left), Some("b".into()));
        assert_eq!(child_key(&arena, root, Side::Right), Some("c".into()));

        let b = arena.find(root, &"b".to_owned()).unwrap();
        assert_eq!(child_key(&arena, b, Side::Left), Some("d".into()));
        assert_eq!(child_key(&arena, b, Side::Right), Some("e".into()));

        let c = arena.find(root, &"c".to_owned()).unwrap();
        assert_eq!(child_key(&arena, c, Side::Left), Some("f".into()));
        assert_eq!(child_key(&arena, c, Side::Right), None);
    }

    #[test]
    fn test_delete_promotes_left_and_reinserts_right() {
        let (mut arena, root) = build(["a", "b", "c", "d", "e", "f"]);

        let removed = arena.remove_by_key(root, &"b".to_owned());
        assert_eq!(removed.map(|(k, _)| k), Some("b".to_owned()));

        // d takes b's position; e is reinserted and lands under d
        assert_eq!(child_key(&arena, root, Side::Left), Some("d".into()));
        let d = arena.find(root, &"d".to_owned()).unwrap();
        assert_eq!(child_key(&arena, d, Side::Left), Some("e".into()));

        for key in ["a", "c", "d", "e", "f"] {
            assert!(arena.find(root, &key.to_owned()).is_some(), "{key} lost");
        }
        assert!(arena.find(root, &"b".to_owned()).is_none());
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let (mut arena, root) = build(["a", "b", "c"]);
        assert!(arena.remove_by_key(root, &"zzz".to_owned()).is_none());
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn test_adjacent_is_children_then_parent() {
        let (arena, root) = build(["a", "b", "c", "d"]);
        let b = arena.find(root, &"b".to_owned()).unwrap();
        let adjacent: Vec<String> = arena
            .adjacent(b)
            .into_iter()
            .map(|idx| arena.key(idx).clone())
            .collect();
        assert_eq!(adjacent, vec!["d".to_owned(), "a".to_owned()]);
    }

    #[test]
    fn test_in_order_traversal() {
        let (arena, root) = build(["a", "b", "c", "d", "e", "f"]);
        let keys: Vec<String> = arena.iter(root).map(|idx| arena.key(idx).clone()).collect();
        assert_eq!(keys, vec!["d", "b", "e", "a", "f", "c"]);
    }

    #[test]
    fn test_detach_orphans_subtree() {
        let (mut arena, root) = build(["a", "b", "c", "d"]);
        let b = arena.detach(root, Side::Left).unwrap();
        assert!(arena.parent(b).is_none());
        // b keeps its own child d
        assert_eq!(child_key(&arena, b, Side::Left), Some("d".into()));
        assert_eq!(child_key(&arena, root, Side::Left), None);
    }

    #[test]
    #[should_panic(expected = "orphan")]
    fn test_attach_non_orphan_panics() {
        let (mut arena, root) = build(["a", "b"]);
        let b = arena.find(root, &"b".to_owned()).unwrap();
        arena.attach(root, Side::Right, b);
    }

    #[test]
    #[should_panic(expected = "itself")]
    fn test_insert_into_itself_panics() {
        let mut arena: NodeArena<String, ()> = NodeArena::new();
        let a = arena.alloc("a".to_owned(), ());
        arena.insert_under(a, a);
    }

    #[test]
    fn test_snapshot_has_no_parent_edges() {
        let (arena, root) = build(["a", "b", "c"]);
        let snapshot = arena.snapshot(root);
        assert_eq!(snapshot.key, "a");
        assert_eq!(snapshot.left.as_ref().unwrap().key, "b");
        assert_eq!(snapshot.right.as_ref().unwrap().key, "c");
        assert!(snapshot.left.unwrap().left.is_none());
    }

    #[test]
    fn test_slot_reuse_after_release() {
        let mut arena: NodeArena<String, ()> = NodeArena::new();
        let root = arena.alloc("a".to_owned(), ());
        let b = arena.alloc("b".to_owned(), ());
        arena.insert_under(root, b);
        arena.remove_by_key(root, &"b".to_owned());

        let c = arena.alloc("c".to_owned(), ());
        arena.insert_under(root, c);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.key(c), "c");
    }
}
