//! Arbor Wire - JSON message shapes
//!
//! The field names in this crate are the wire contract; clients match on
//! them verbatim. Three families of messages exist:
//! - client → server: [`ClientMessage`]
//! - server → client state/relay: [`ServerMessage`]
//! - server → client errors: [`ErrorEnvelope`]
//!
//! Binary values (challenges, signatures, public keys) travel as base64
//! strings; the [`codec`] module holds the encode/decode helpers.

pub mod client;
pub mod codec;
pub mod envelope;
pub mod server;

pub use client::*;
pub use codec::*;
pub use envelope::*;
pub use server::*;
