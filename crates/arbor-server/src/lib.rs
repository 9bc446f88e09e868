//! Arbor Server - Room coordination over WebSocket
//!
//! Wires incoming connections to per-room topologies:
//! - audience connections are inserted straight into the room's tree;
//! - broadcaster connections must pass the challenge-response protocol
//!   before being installed as the tree root;
//! - every structural change is pushed to members as `NODE_STATE` and to
//!   structure observers as `GRAPH_STATE`;
//! - `MESSAGE` relay requests are forwarded only along tree adjacency.
//!
//! All mutations of one room are serialized by that room's actor task;
//! connection I/O stays concurrent.

pub mod client;
pub mod config;
pub mod registry;
pub mod room;
pub mod ws;

pub use client::*;
pub use config::*;
pub use registry::*;
pub use room::*;
pub use ws::*;
