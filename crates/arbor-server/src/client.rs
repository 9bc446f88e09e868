//! Outgoing message handle for one connection
//!
//! The room actor never touches sockets; it pushes [`ServerMessage`]s
//! into this handle and a per-connection pump task drains them into the
//! WebSocket sink. Closing the connection is expressed by dropping every
//! clone of the handle.

use tokio::sync::mpsc;

use arbor_wire::ServerMessage;

/// Cheap, cloneable sender half of a connection's outgoing queue
#[derive(Clone, Debug)]
pub struct ClientHandle {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ClientHandle {
    /// Create a handle together with the receiver the pump task drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ClientHandle { tx }, rx)
    }

    /// Queue a message; returns false when the connection is gone
    pub fn send(&self, message: impl Into<ServerMessage>) -> bool {
        self.tx.send(message.into()).is_ok()
    }

    /// True once the receiving side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_wire::ErrorEnvelope;

    #[tokio::test]
    async fn test_send_after_drop_reports_closed() {
        let (client, rx) = ClientHandle::channel();
        assert!(!client.is_closed());
        drop(rx);
        assert!(client.is_closed());
        assert!(!client.send(ErrorEnvelope::still_processing()));
    }
}
