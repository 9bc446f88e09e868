//! Arbor Auth - Root-node identity verification
//!
//! A broadcaster claims an identity (a base64-encoded 65-byte uncompressed
//! NIST P-256 public key) and must prove possession of the matching
//! private key before it may occupy a room's tree root. The proof is a
//! random-challenge/signature exchange driven by [`AuthSession`]:
//!
//! - Identity is proven, not merely claimed, so nobody can impersonate a
//!   room's broadcast origin.
//! - Audience members are not authenticated at all.

pub mod key;
pub mod session;

pub use key::*;
pub use session::*;
