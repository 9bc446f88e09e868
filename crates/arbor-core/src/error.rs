//! Error types for the Arbor signaling server

use thiserror::Error;

/// Core Arbor errors
#[derive(Error, Debug)]
pub enum ArborError {
    // Identity errors
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),

    #[error("Bad public key length: expected {expected} bytes, got {actual}")]
    BadKeyLength { expected: usize, actual: usize },

    #[error("Public key is not a valid P-256 point")]
    BadKeyFormat,

    // Authentication errors
    #[error("Bad signature length: expected {expected} bytes, got {actual}")]
    BadSignatureLength { expected: usize, actual: usize },

    #[error("Challenge mismatch")]
    ChallengeMismatch,

    #[error("Signature verification failed")]
    InvalidSignature,

    // Room errors
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Node key already in use: {0}")]
    KeyInUse(String),

    // Wire errors
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for Arbor operations
pub type ArborResult<T> = Result<T, ArborError>;
