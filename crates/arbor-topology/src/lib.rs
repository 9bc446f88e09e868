//! Arbor Topology - The per-room fan-out tree
//!
//! Every broadcast room owns one [`Topology`]: an unordered binary tree of
//! member nodes, with the broadcaster at the root and audience members
//! below it. Clients read the tree shape to establish their own relay
//! links to parent/child neighbors; the server only maintains the shape.
//!
//! Nodes live in an index-addressed arena rather than an owned pointer
//! graph: `parent`/`left`/`right` are slot indices, which makes
//! detach/reattach an index rewrite and keeps ownership unambiguous.
//!
//! Insertion follows a greedy shape heuristic (descend into the subtree
//! with the nearest open slot), not a value ordering. The heuristic fills
//! the tree in roughly level order but does not rebalance; adversarial
//! insert/delete sequences can degrade to O(n) depth, which makes
//! whole-tree operations worst-case O(n²).

pub mod arena;
pub mod topology;

pub use arena::*;
pub use topology::*;
