//! Client → server messages

use serde::{Deserialize, Serialize};

/// Any message a connected client may send
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Broadcaster answering the issued challenge
    #[serde(rename = "CHALLENGE_RESPONSE")]
    ChallengeResponse {
        data: ChallengeResponseData,
        #[serde(
            rename = "messageId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        message_id: Option<String>,
    },
    /// Relay request toward an adjacent node
    #[serde(rename = "MESSAGE")]
    Relay {
        data: RelayRequest,
        #[serde(
            rename = "messageId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        message_id: Option<String>,
    },
}

impl ClientMessage {
    /// The message id to echo in error responses, when present
    pub fn message_id(&self) -> Option<&str> {
        match self {
            ClientMessage::ChallengeResponse { message_id, .. }
            | ClientMessage::Relay { message_id, .. } => message_id.as_deref(),
        }
    }
}

/// `{message, signature}`, both base64; the signature must decode to the
/// 64-byte raw r ‖ s form
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChallengeResponseData {
    pub message: String,
    pub signature: String,
}

/// Payload addressed to one neighbor key
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayRequest {
    pub to: String,
    pub payload: serde_json::Value,
}
