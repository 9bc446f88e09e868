//! WebSocket endpoints
//!
//! Three upgrade routes per room (called a tree on the wire):
//!
//! - `/trees/:tree_id/view/:node_id` joins the audience under the chosen
//!   node key;
//! - `/trees/:tree_id/view/structure-only` watches the tree shape without
//!   joining it;
//! - `/trees/:tree_id/broadcast` runs the challenge-response protocol and,
//!   on success, installs the connection as the tree root. The tree id of
//!   this route is the broadcaster's claimed base64 public key.
//!
//! Every connection gets a pump task that serializes queued
//! [`ServerMessage`]s onto the socket; the read half stays in the handler.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use arbor_auth::{AuthSession, BeginOutcome, Phase, ResponseOutcome, SIGNATURE_LEN};
use arbor_core::{NodeKey, RoomId};
use arbor_wire::{codec, ChallengeMessage, ClientMessage, ErrorEnvelope, Originator, ServerMessage};

use crate::{ClientHandle, JoinResult, RoomHandle, RoomRegistry};

pub fn router(registry: Arc<RoomRegistry>) -> Router {
    Router::new()
        .route("/trees/:tree_id/view/structure-only", get(observer_upgrade))
        .route("/trees/:tree_id/view/:node_id", get(audience_upgrade))
        .route("/trees/:tree_id/broadcast", get(broadcaster_upgrade))
        .fallback(bad_url)
        .with_state(registry)
}

async fn observer_upgrade(
    ws: WebSocketUpgrade,
    Path(tree_id): Path<String>,
    State(registry): State<Arc<RoomRegistry>>,
) -> Response {
    ws.on_upgrade(move |socket| observer_connection(socket, registry, RoomId::from(tree_id)))
}

async fn audience_upgrade(
    ws: WebSocketUpgrade,
    Path((tree_id, node_id)): Path<(String, String)>,
    State(registry): State<Arc<RoomRegistry>>,
) -> Response {
    ws.on_upgrade(move |socket| {
        audience_connection(socket, registry, RoomId::from(tree_id), NodeKey::from(node_id))
    })
}

async fn broadcaster_upgrade(
    ws: WebSocketUpgrade,
    Path(tree_id): Path<String>,
    State(registry): State<Arc<RoomRegistry>>,
) -> Response {
    ws.on_upgrade(move |socket| broadcaster_connection(socket, registry, RoomId::from(tree_id)))
}

async fn bad_url(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorEnvelope::bad_url(uri.path())),
    )
        .into_response()
}

/// Drain the outgoing queue onto the socket. Ends when every
/// [`ClientHandle`] clone is gone or the peer hangs up.
fn spawn_pump(
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    mut sink: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    })
}

/// Pull the next text frame, skipping control frames
async fn next_text(stream: &mut futures::stream::SplitStream<WebSocket>) -> Option<String> {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

async fn observer_connection(socket: WebSocket, registry: Arc<RoomRegistry>, room_id: RoomId) {
    let (sink, mut stream) = socket.split();
    let (client, rx) = ClientHandle::channel();
    let pump = spawn_pump(rx, sink);

    registry.room(&room_id).observe(client);
    tracing::debug!(room = %room_id, "observer connected");

    // observers are write-only from our side; just wait for the hangup
    while next_text(&mut stream).await.is_some() {}
    pump.abort();
}

async fn audience_connection(
    socket: WebSocket,
    registry: Arc<RoomRegistry>,
    room_id: RoomId,
    key: NodeKey,
) {
    let (sink, mut stream) = socket.split();
    let (client, rx) = ClientHandle::channel();
    let pump = spawn_pump(rx, sink);

    let room = registry.room(&room_id);
    match room.join(key.clone(), client.clone()).await {
        JoinResult::Joined => {
            tracing::debug!(room = %room_id, key = %key, "audience member connected");
        }
        JoinResult::KeyInUse => {
            client.send(ErrorEnvelope::node_id_in_use(key.as_str()));
            drop(client);
            let _ = pump.await;
            return;
        }
        JoinResult::Closed => {
            client.send(ErrorEnvelope::server_fault(json!({
                "detail": "room shut down during join"
            })));
            drop(client);
            let _ = pump.await;
            return;
        }
    }

    while let Some(text) = next_text(&mut stream).await {
        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Relay { data, .. }) => {
                room.relay(key.clone(), NodeKey::from(data.to), data.payload);
            }
            Ok(ClientMessage::ChallengeResponse { message_id, .. }) => {
                client.send(
                    ErrorEnvelope::bad_payload_for_state("VALIDATED", &["MESSAGE"])
                        .response_to(message_id.as_deref()),
                );
            }
            Err(e) => {
                client.send(ErrorEnvelope::bad_incoming_message(json!({
                    "reason": e.to_string()
                })));
            }
        }
    }

    room.leave(key);
    drop(client);
    let _ = pump.await;
}

async fn broadcaster_connection(socket: WebSocket, registry: Arc<RoomRegistry>, room_id: RoomId) {
    let (sink, mut stream) = socket.split();
    let (client, rx) = ClientHandle::channel();
    let pump = spawn_pump(rx, sink);

    // the tree id on this route is the claimed public key
    let mut session = AuthSession::new(room_id.as_str());
    match session.begin() {
        BeginOutcome::Challenge(challenge) => {
            client.send(ChallengeMessage::new(&challenge));
        }
        BeginOutcome::BadKey(error) => {
            client.send(ErrorEnvelope::bad_key_format(
                error.to_string(),
                room_id.as_str(),
                Originator::Client,
            ));
            drop(client);
            let _ = pump.await;
            return;
        }
    }

    // the room is only materialized once the identity is proven; failed
    // attempts must not spawn an actor that nothing will ever tear down
    let key = NodeKey::from(room_id.as_str());
    let mut joined: Option<RoomHandle> = None;

    while let Some(text) = next_text(&mut stream).await {
        let parsed = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                client.send(ErrorEnvelope::bad_incoming_message(json!({
                    "reason": e.to_string()
                })));
                continue;
            }
        };

        match parsed {
            ClientMessage::ChallengeResponse { data, message_id } => {
                let message_id = message_id.as_deref();
                let message = match codec::decode(&data.message) {
                    Ok(message) => message,
                    Err(e) => {
                        client.send(
                            ErrorEnvelope::bad_incoming_message(
                                json!({"field": "message", "reason": e.to_string()}),
                            )
                            .response_to(message_id),
                        );
                        continue;
                    }
                };
                // wrong length is a schema error here, not an auth
                // failure: the session never sees the response
                let signature = match codec::decode_exact::<SIGNATURE_LEN>(&data.signature) {
                    Ok(signature) => signature,
                    Err(e) => {
                        client.send(
                            ErrorEnvelope::bad_incoming_message(
                                json!({"field": "signature", "reason": e.to_string()}),
                            )
                            .response_to(message_id),
                        );
                        continue;
                    }
                };

                match session.handle_response(&message, &signature) {
                    ResponseOutcome::Validated => {
                        let room = registry.room(&room_id);
                        match room.install_root(key.clone(), client.clone()).await {
                            JoinResult::Joined => {
                                joined = Some(room);
                            }
                            JoinResult::KeyInUse => {
                                client.send(
                                    ErrorEnvelope::node_id_in_use(key.as_str())
                                        .response_to(message_id),
                                );
                                break;
                            }
                            JoinResult::Closed => break,
                        }
                    }
                    ResponseOutcome::StillPreparing => {
                        client.send(ErrorEnvelope::still_processing().response_to(message_id));
                    }
                    ResponseOutcome::AlreadyResponded => {
                        client.send(ErrorEnvelope::already_responded().response_to(message_id));
                    }
                    ResponseOutcome::Rejected(error) => {
                        tracing::debug!(room = %room_id, error = %error, "broadcaster rejected");
                        client.send(
                            ErrorEnvelope::challenge_failed(
                                session.claimed_key(),
                                &data.message,
                                &data.signature,
                            )
                            .response_to(message_id),
                        );
                        break;
                    }
                    ResponseOutcome::Ignored => {
                        tracing::debug!(room = %room_id, "response in terminal phase ignored");
                    }
                }
            }
            ClientMessage::Relay { data, message_id } => {
                match &joined {
                    Some(room) => {
                        room.relay(key.clone(), NodeKey::from(data.to), data.payload);
                    }
                    None => {
                        client.send(
                            ErrorEnvelope::bad_payload_for_state(
                                phase_name(session.phase()),
                                &["CHALLENGE_RESPONSE"],
                            )
                            .response_to(message_id.as_deref()),
                        );
                    }
                }
            }
        }
    }

    if let Some(room) = joined {
        room.leave(key);
    }
    drop(client);
    let _ = pump.await;
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::PreparingChallenge => "PREPARING_CHALLENGE",
        Phase::AwaitingResponse => "AWAITING_CHALLENGE_RESPONSE",
        Phase::Validated => "VALIDATED",
        Phase::Failed => "FAILED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names_match_wire_vocabulary() {
        assert_eq!(phase_name(Phase::PreparingChallenge), "PREPARING_CHALLENGE");
        assert_eq!(
            phase_name(Phase::AwaitingResponse),
            "AWAITING_CHALLENGE_RESPONSE"
        );
        assert_eq!(phase_name(Phase::Validated), "VALIDATED");
    }

    #[tokio::test]
    async fn test_bad_url_is_not_found_with_envelope() {
        let response = bad_url(Uri::from_static("/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_router_builds() {
        let _ = router(RoomRegistry::new());
    }
}
