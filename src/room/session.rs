//! Transport-independent view of one connected participant.

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::protocol::{ClientMessage, CloseReason, DecodeError, Outbound, ServerMessage};

/// Decoded frames from the client. The stream ends when the peer goes away.
pub type Inbound = BoxStream<'static, Result<ClientMessage, DecodeError>>;

/// Write half of a connection. Cheap to clone; sends never block.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Session {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { id: Uuid::new_v4(), tx }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queues a message for the writer. Returns false once the writer is gone.
    pub fn send(&self, msg: ServerMessage) -> bool {
        let ok = self.tx.send(Outbound::Message(msg)).is_ok();
        if !ok {
            debug!(connection = %self.id, "send on closed session dropped");
        }
        ok
    }

    pub fn close(&self, reason: CloseReason) {
        let _ = self.tx.send(Outbound::Close(reason));
    }
}

/// A session plus the only reader of its inbound frames. Moving the
/// `Connection` moves read ownership with it.
pub struct Connection {
    pub session: Session,
    pub inbound: Inbound,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Client side of an [`in_memory`] connection.
pub struct RemoteEnd {
    tx: mpsc::UnboundedSender<Result<ClientMessage, DecodeError>>,
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl RemoteEnd {
    pub fn send(&self, msg: ClientMessage) -> bool {
        self.tx.send(Ok(msg)).is_ok()
    }

    /// Sends a raw text frame through the same decoder the websocket uses.
    pub fn send_text(&self, text: &str) -> bool {
        self.tx.send(ClientMessage::decode(text)).is_ok()
    }

    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.rx.try_recv().ok()
    }

    /// Ends the inbound stream while still observing what the server sends.
    pub fn hang_up(self) -> mpsc::UnboundedReceiver<Outbound> {
        self.rx
    }
}

/// Connection backed by channels instead of a socket.
pub fn in_memory() -> (Connection, RemoteEnd) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let inbound = stream::unfold(in_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    })
    .boxed();

    let conn = Connection {
        session: Session::new(out_tx),
        inbound,
    };
    (conn, RemoteEnd { tx: in_tx, rx: out_rx })
}
