//! Error envelope
//!
//! Every error response is a `{error: {...}}` object carrying a type
//! string, a list of error objects, the party at fault, and the id of the
//! client message it answers (when one exists) so the client can
//! correlate failures with requests.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Who caused the error
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Originator {
    Client,
    Server,
    Unsure,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl ErrorObject {
    pub fn new(title: impl Into<String>, detail: impl Into<String>) -> Self {
        ErrorObject {
            title: Some(title.into()),
            detail: Some(detail.into()),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub errors: Vec<ErrorObject>,
    #[serde(rename = "errorOriginator")]
    pub originator: Originator,
    #[serde(rename = "responseTo", skip_serializing_if = "Option::is_none")]
    pub response_to: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    fn new(kind: &str, errors: Vec<ErrorObject>, originator: Originator) -> Self {
        ErrorEnvelope {
            error: ErrorBody {
                kind: kind.to_owned(),
                errors,
                originator,
                response_to: None,
            },
        }
    }

    pub fn response_to(mut self, message_id: Option<&str>) -> Self {
        self.error.response_to = message_id.map(str::to_owned);
        self
    }

    /// The claimed node key did not decode to a usable P-256 public key
    pub fn bad_key_format(detail: impl Into<String>, key: &str, originator: Originator) -> Self {
        ErrorEnvelope::new(
            "BAD_KEY_FORMAT",
            vec![
                ErrorObject::new("Bad key format", detail).with_meta(json!({ "key": key })),
            ],
            originator,
        )
    }

    /// Signature verification against the issued challenge failed
    pub fn challenge_failed(public_key: &str, message: &str, signature: &str) -> Self {
        ErrorEnvelope::new(
            "CLIENT_ERROR",
            vec![ErrorObject::new(
                "Challenge failed",
                "Signature verification against the supplied message failed",
            )
            .with_meta(json!({
                "publicKey": public_key,
                "message": message,
                "signature": signature,
            }))],
            Originator::Client,
        )
    }

    /// The claimed identity is still being imported; retry after the
    /// challenge arrives
    pub fn still_processing() -> Self {
        ErrorEnvelope::new(
            "PROCESSING_TREE_ID",
            vec![ErrorObject::new(
                "Tree ID still processing",
                "The tree ID is processed asynchronously. Please wait until a challenge is provided",
            )],
            Originator::Client,
        )
    }

    /// A challenge response was already accepted for this session
    pub fn already_responded() -> Self {
        ErrorEnvelope::new(
            "CLIENT_ERROR",
            vec![ErrorObject::new(
                "Already got challenge response",
                "The connection has already supplied a challenge response",
            )],
            Originator::Client,
        )
    }

    /// Message type not acceptable in the session's current state
    pub fn bad_payload_for_state(current_state: &str, expected: &[&str]) -> Self {
        ErrorEnvelope::new(
            "CLIENT_ERROR",
            vec![ErrorObject::new(
                "Got message from broadcaster, in invalid state",
                format!(
                    "The current state of the session is {current_state}, and the only acceptable message types are [{}]",
                    expected.join(",")
                ),
            )],
            Originator::Client,
        )
    }

    /// The message body failed schema validation or JSON parsing
    pub fn bad_incoming_message(meta: serde_json::Value) -> Self {
        ErrorEnvelope::new(
            "BAD_INCOMING_MESSAGE",
            vec![ErrorObject::new(
                "Got a bad message",
                "The message body could not be understood. See the meta field for details",
            )
            .with_meta(meta)],
            Originator::Client,
        )
    }

    /// Unroutable URL path on the upgrade request
    pub fn bad_url(path: &str) -> Self {
        ErrorEnvelope::new(
            "BAD_URL_ERROR",
            vec![ErrorObject::new(
                "Got a bad URL",
                format!("The URL path \"{path}\" is not found"),
            )],
            Originator::Client,
        )
    }

    /// The node key is already occupied in this room
    pub fn node_id_in_use(key: &str) -> Self {
        ErrorEnvelope::new(
            "NODE_ID_IN_USE",
            vec![ErrorObject::new(
                "Node ID is in use",
                format!("The node ID \"{key}\" is already in use"),
            )],
            Originator::Client,
        )
    }

    /// Unexpected server-side failure
    pub fn server_fault(meta: serde_json::Value) -> Self {
        ErrorEnvelope::new(
            "FATAL_ERROR",
            vec![ErrorObject {
                title: Some("An unknown server error occurred".to_owned()),
                detail: None,
                meta: Some(meta),
            }],
            Originator::Server,
        )
    }
}
