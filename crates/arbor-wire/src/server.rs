//! Server → client messages

use serde::{Deserialize, Serialize};

use crate::ErrorEnvelope;

/// Any message the server sends over a connection.
///
/// The envelope shapes differ (`type`-tagged state messages, the
/// `payload`-wrapped challenge, the `error` envelope), so the enum is
/// untagged and each variant carries its own discriminating structure.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    State(StateMessage),
    Challenge(ChallengeMessage),
    Error(ErrorEnvelope),
}

impl From<StateMessage> for ServerMessage {
    fn from(m: StateMessage) -> Self {
        ServerMessage::State(m)
    }
}

impl From<ChallengeMessage> for ServerMessage {
    fn from(m: ChallengeMessage) -> Self {
        ServerMessage::Challenge(m)
    }
}

impl From<ErrorEnvelope> for ServerMessage {
    fn from(e: ErrorEnvelope) -> Self {
        ServerMessage::Error(e)
    }
}

/// `type`-tagged state and relay messages
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StateMessage {
    /// One member's personal neighborhood after a topology change
    #[serde(rename = "NODE_STATE")]
    NodeState { data: NodeStateData },
    /// Whole-tree shape for structure observers
    #[serde(rename = "GRAPH_STATE")]
    GraphState { data: Option<GraphNode> },
    /// Relayed payload, tagged with its route
    #[serde(rename = "MESSAGE")]
    Relay { data: RelayedMessage },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeStateData {
    #[serde(rename = "selfNode")]
    pub self_node: NodeRef,
    pub parent: Option<NodeRef>,
    pub left: Option<NodeRef>,
    pub right: Option<NodeRef>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeRef {
    pub id: String,
}

impl NodeRef {
    pub fn new(id: impl Into<String>) -> Self {
        NodeRef { id: id.into() }
    }
}

/// Recursive, parent-free tree snapshot
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphNode {
    pub key: String,
    pub left: Option<Box<GraphNode>>,
    pub right: Option<Box<GraphNode>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayedMessage {
    pub from: String,
    pub to: String,
    pub payload: serde_json::Value,
}

/// `{payload: {type: "CHALLENGE", data: base64(16 bytes)}}`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChallengeMessage {
    pub payload: ChallengePayload,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChallengePayload {
    #[serde(rename = "CHALLENGE")]
    Challenge { data: String },
}

impl ChallengeMessage {
    pub fn new(challenge: &[u8]) -> Self {
        ChallengeMessage {
            payload: ChallengePayload::Challenge {
                data: crate::codec::encode(challenge),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_state_shape() {
        let message = ServerMessage::from(StateMessage::NodeState {
            data: NodeStateData {
                self_node: NodeRef::new("me"),
                parent: Some(NodeRef::new("p")),
                left: None,
                right: Some(NodeRef::new("r")),
            },
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "NODE_STATE",
                "data": {
                    "selfNode": {"id": "me"},
                    "parent": {"id": "p"},
                    "left": null,
                    "right": {"id": "r"}
                }
            })
        );
    }

    #[test]
    fn test_graph_state_shape() {
        let message = StateMessage::GraphState {
            data: Some(GraphNode {
                key: "root".into(),
                left: Some(Box::new(GraphNode {
                    key: "a".into(),
                    left: None,
                    right: None,
                })),
                right: None,
            }),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "GRAPH_STATE",
                "data": {
                    "key": "root",
                    "left": {"key": "a", "left": null, "right": null},
                    "right": null
                }
            })
        );
        // never a parent field anywhere in the snapshot
        assert!(!value.to_string().contains("parent"));
    }

    #[test]
    fn test_challenge_shape() {
        let message = ChallengeMessage::new(&[0u8; 16]);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "payload": {
                    "type": "CHALLENGE",
                    "data": "AAAAAAAAAAAAAAAAAAAAAA=="
                }
            })
        );
    }

    #[test]
    fn test_relay_shape() {
        let message = StateMessage::Relay {
            data: RelayedMessage {
                from: "a".into(),
                to: "b".into(),
                payload: json!({"candidate": "..."}),
            },
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "MESSAGE");
        assert_eq!(value["data"]["from"], "a");
        assert_eq!(value["data"]["to"], "b");
    }
}
