//! WebSocket connection lifecycle management.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::handshake::{self, HandshakeError};
use crate::http::routes::AppState;
use crate::protocol::{ClientMessage, DecodeError, Outbound};
use crate::room::{Connection, Session};

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let connection = attach(socket, state.write_timeout);
    let span = info_span!("connection", id = %connection.session.id());

    async move {
        match handshake::run(&state.rooms, connection).await {
            Ok(seated) => debug!(room_id = %seated.room_id, slot = ?seated.slot, "handed off to room"),
            Err(HandshakeError::Disconnected) => debug!("left from lobby"),
            Err(err) => info!(%err, "handshake failed"),
        }
    }
    .instrument(span)
    .await
}

pub fn attach(socket: WebSocket, write_timeout: Duration) -> Connection {
    let (ws_tx, ws_rx) = socket.split();
    connect(ws_tx, ws_rx, write_timeout)
}

/// Puts a writer task in front of `sink` and decodes `source` into the
/// connection's inbound stream. Once the writer stops, for whatever reason,
/// the inbound stream ends as well, so a dead peer frees its seat the same way
/// an orderly close does.
pub fn connect<Tx, Rx, E>(sink: Tx, source: Rx, write_timeout: Duration) -> Connection
where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Tx::Error: fmt::Display + Send,
    Rx: Stream<Item = Result<Message, E>> + Send + 'static,
    E: Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<Outbound>();
    let session = Session::new(tx);
    let writer_done = CancellationToken::new();

    tokio::spawn(write_frames(
        sink,
        rx,
        write_timeout,
        session.id(),
        writer_done.clone(),
    ));

    let inbound = read_frames(source)
        .take_until(writer_done.cancelled_owned())
        .boxed();

    Connection { session, inbound }
}

async fn write_frames<Tx>(
    mut sink: Tx,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    write_timeout: Duration,
    id: Uuid,
    done: CancellationToken,
) where
    Tx: Sink<Message> + Unpin,
    Tx::Error: fmt::Display,
{
    let _done = done.drop_guard();

    while let Some(out) = rx.recv().await {
        let (frame, last) = match out {
            Outbound::Message(msg) => match serde_json::to_string(&msg) {
                Ok(text) => (Message::Text(text), false),
                Err(err) => {
                    warn!(connection = %id, %err, "failed to encode message");
                    continue;
                }
            },
            Outbound::Close(reason) => (
                Message::Close(Some(CloseFrame {
                    code: reason.code(),
                    reason: Cow::Borrowed(reason.reason()),
                })),
                true,
            ),
        };
        match tokio::time::timeout(write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(connection = %id, %err, "write failed");
                break;
            }
            Err(_) => {
                warn!(connection = %id, timeout = ?write_timeout, "write timed out");
                break;
            }
        }
        if last {
            break;
        }
    }

    // a stalled peer must not pin the task here either
    match tokio::time::timeout(write_timeout, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(connection = %id, %err, "close failed"),
        Err(_) => debug!(connection = %id, "close timed out"),
    }
    debug!(connection = %id, "writer finished");
}

/// Decoded client frames up to the first close frame or transport error.
fn read_frames<Rx, E>(source: Rx) -> impl Stream<Item = Result<ClientMessage, DecodeError>>
where
    Rx: Stream<Item = Result<Message, E>>,
{
    source
        .take_while(|frame| future::ready(matches!(frame, Ok(msg) if !matches!(msg, Message::Close(_)))))
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(ClientMessage::decode(&text)),
                Ok(Message::Binary(bytes)) => Some(ClientMessage::decode(&String::from_utf8_lossy(&bytes))),
                _ => None,
            })
        })
}
