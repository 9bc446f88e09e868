//! Per-room actor
//!
//! Each room runs one task that owns the room's [`Topology`] and
//! processes commands from connection tasks over an unbounded channel.
//! Serializing every mutation through the actor removes all locking from
//! the tree itself.
//!
//! After each command the actor drains the topology's event stream and
//! fans the resulting state out: a fresh `NODE_STATE` to every member and
//! a `GRAPH_STATE` snapshot to every structure observer. When a removal
//! leaves the tree empty the actor exits and the room is dropped from the
//! registry.

use tokio::sync::{broadcast, mpsc, oneshot};

use arbor_core::{NodeKey, RoomId};
use arbor_topology::{MemberView, SnapshotNode, Topology, TopologyChange, TopologyEvent};
use arbor_wire::{GraphNode, NodeRef, NodeStateData, RelayedMessage, StateMessage};

use crate::ClientHandle;

/// Outcome of asking the actor to admit a member
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinResult {
    Joined,
    /// Another live connection already holds this node key
    KeyInUse,
    /// The room actor has already shut down
    Closed,
}

/// Commands a connection task can send to the room actor
pub enum RoomCommand {
    Join {
        key: NodeKey,
        client: ClientHandle,
        reply: oneshot::Sender<JoinResult>,
    },
    InstallRoot {
        key: NodeKey,
        client: ClientHandle,
        reply: oneshot::Sender<JoinResult>,
    },
    Leave {
        key: NodeKey,
    },
    Relay {
        from: NodeKey,
        to: NodeKey,
        payload: serde_json::Value,
    },
    Observe {
        client: ClientHandle,
    },
}

/// Cheap handle for talking to one room's actor
#[derive(Clone)]
pub struct RoomHandle {
    tx: mpsc::UnboundedSender<RoomCommand>,
    epoch: u64,
}

impl RoomHandle {
    /// Identifies this incarnation of the room within the registry
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True once the actor task has exited
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Insert an audience member into the tree
    pub async fn join(&self, key: NodeKey, client: ClientHandle) -> JoinResult {
        let (reply, response) = oneshot::channel();
        if self
            .tx
            .send(RoomCommand::Join { key, client, reply })
            .is_err()
        {
            return JoinResult::Closed;
        }
        response.await.unwrap_or(JoinResult::Closed)
    }

    /// Install a validated broadcaster as the tree root
    pub async fn install_root(&self, key: NodeKey, client: ClientHandle) -> JoinResult {
        let (reply, response) = oneshot::channel();
        if self
            .tx
            .send(RoomCommand::InstallRoot { key, client, reply })
            .is_err()
        {
            return JoinResult::Closed;
        }
        response.await.unwrap_or(JoinResult::Closed)
    }

    /// Remove a member; safe to call for keys that never joined
    pub fn leave(&self, key: NodeKey) {
        let _ = self.tx.send(RoomCommand::Leave { key });
    }

    /// Forward a payload to a tree-adjacent member
    pub fn relay(&self, from: NodeKey, to: NodeKey, payload: serde_json::Value) {
        let _ = self.tx.send(RoomCommand::Relay { from, to, payload });
    }

    /// Register a structure-only observer
    pub fn observe(&self, client: ClientHandle) {
        let _ = self.tx.send(RoomCommand::Observe { client });
    }
}

/// Spawn the actor task for a room; `on_close` runs after the actor
/// exits so the owner can drop its handle.
pub fn spawn_room(id: RoomId, epoch: u64, on_close: impl FnOnce() + Send + 'static) -> RoomHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let topology: Topology<NodeKey, ClientHandle> = Topology::new();
    let events = topology.subscribe();
    let mut room = Room {
        id,
        topology,
        events,
        observers: Vec::new(),
    };

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            room.handle(command);
            if room.flush_events() {
                break;
            }
        }
        tracing::debug!(room = %room.id, "room closed");
        on_close();
    });

    RoomHandle { tx, epoch }
}

struct Room {
    id: RoomId,
    topology: Topology<NodeKey, ClientHandle>,
    events: broadcast::Receiver<TopologyEvent<NodeKey>>,
    observers: Vec<ClientHandle>,
}

impl Room {
    fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join { key, client, reply } => {
                // the connection may have died while the command was queued
                if client.is_closed() {
                    return;
                }
                if self.topology.contains(&key) {
                    let _ = reply.send(JoinResult::KeyInUse);
                    return;
                }
                tracing::debug!(room = %self.id, key = %key, "member joined");
                self.topology.insert(key, client);
                let _ = reply.send(JoinResult::Joined);
            }
            RoomCommand::InstallRoot { key, client, reply } => {
                if client.is_closed() {
                    return;
                }
                if self.topology.contains(&key) {
                    let _ = reply.send(JoinResult::KeyInUse);
                    return;
                }
                tracing::info!(room = %self.id, key = %key, "broadcaster installed as root");
                self.topology.set_root(key, client);
                let _ = reply.send(JoinResult::Joined);
            }
            RoomCommand::Leave { key } => {
                tracing::debug!(room = %self.id, key = %key, "member left");
                self.topology.remove_by_key(&key);
            }
            RoomCommand::Relay { from, to, payload } => {
                let target = self
                    .topology
                    .adjacent(&from)
                    .into_iter()
                    .find(|(key, _)| **key == to);
                match target {
                    Some((_, client)) => {
                        client.send(StateMessage::Relay {
                            data: RelayedMessage {
                                from: from.into_string(),
                                to: to.into_string(),
                                payload,
                            },
                        });
                    }
                    None => {
                        tracing::debug!(
                            room = %self.id, from = %from, to = %to,
                            "relay target not adjacent, dropping"
                        );
                    }
                }
            }
            RoomCommand::Observe { client } => {
                client.send(StateMessage::GraphState {
                    data: self.topology.snapshot().as_ref().map(graph_node),
                });
                self.observers.push(client);
            }
        }
    }

    /// Publish every pending topology event. Returns true when a removal
    /// emptied the tree and the room should shut down.
    fn flush_events(&mut self) -> bool {
        let mut empty = false;
        while let Ok(event) = self.events.try_recv() {
            for view in self.topology.members() {
                view.value.send(node_state(&view));
            }
            let graph = StateMessage::GraphState {
                data: event.snapshot.as_ref().map(graph_node),
            };
            self.observers
                .retain(|observer| observer.send(graph.clone()));
            if event.change == TopologyChange::Removed && event.snapshot.is_none() {
                empty = true;
            }
        }
        empty
    }
}

fn node_state(view: &MemberView<'_, NodeKey, ClientHandle>) -> StateMessage {
    let node_ref = |key: &NodeKey| NodeRef::new(key.as_str());
    StateMessage::NodeState {
        data: NodeStateData {
            self_node: node_ref(view.key),
            parent: view.parent.map(node_ref),
            left: view.left.map(node_ref),
            right: view.right.map(node_ref),
        },
    }
}

fn graph_node(snapshot: &SnapshotNode<NodeKey>) -> GraphNode {
    GraphNode {
        key: snapshot.key.as_str().to_owned(),
        left: snapshot
            .left
            .as_deref()
            .map(|node| Box::new(graph_node(node))),
        right: snapshot
            .right
            .as_deref()
            .map(|node| Box::new(graph_node(node))),
    }
}
