//! Arbor Core - Fundamental types shared across the workspace
//!
//! This crate defines the identifiers and the error taxonomy used
//! throughout the Arbor signaling server:
//! - Identifiers (RoomId, NodeKey)
//! - Error types (ArborError, ArborResult)

pub mod error;
pub mod id;

pub use error::*;
pub use id::*;
