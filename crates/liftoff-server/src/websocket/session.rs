//! WebSocket peer lifecycle: handles a single connected client from upgrade
//! through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use liftoff_core::ConnectionId;
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::handler::{CommandGate, Frame, handle_message};
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::coordinator::CoordinatorHandle;
use crate::errors::CoordinatorError;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

/// How long the writer gets to flush a close frame before it is aborted.
const WRITER_GRACE: Duration = Duration::from_secs(1);

/// Everything a connection needs, shared by all connections.
pub struct WsContext {
    /// Coordinator that owns the session.
    pub coordinator: CoordinatorHandle,
    /// Frame limits and access policy.
    pub gate: CommandGate,
    /// Per-peer outbound queue depth.
    pub send_queue_capacity: usize,
    /// Ping interval.
    pub heartbeat_interval: Duration,
    /// Close after this long without a pong.
    pub heartbeat_timeout: Duration,
    /// Server-wide shutdown; each connection gets a child token.
    pub shutdown: CancellationToken,
}

/// Run a WebSocket session for a connected peer.
///
/// 1. Registers with the coordinator, which sends the current snapshot
/// 2. Forwards queued snapshots and periodic pings from a writer task
/// 3. Turns inbound text (or UTF-8 binary) frames into commands
/// 4. Closes on peer close, read error, heartbeat timeout, coordinator
///    drop, or server shutdown
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(ws: WebSocket, conn_id: ConnectionId, ctx: Arc<WsContext>) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<str>>(ctx.send_queue_capacity.max(1));
    let cancel = ctx.shutdown.child_token();
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx, cancel.clone()));

    info!("peer connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let writer_cancel = cancel.clone();
    let ping_every = ctx.heartbeat_interval;
    let mut writer = tokio::spawn(
        async move {
            let mut ping_interval = tokio::time::interval(ping_every);
            // Skip the immediate first tick
            let _ = ping_interval.tick().await;

            loop {
                tokio::select! {
                    () = writer_cancel.cancelled() => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    frame = send_rx.recv() => {
                        let Some(frame) = frame else { break };
                        if ws_tx.send(Message::Text(frame.as_ref().into())).await.is_err() {
                            break;
                        }
                    }
                    _ = ping_interval.tick() => {
                        if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            writer_cancel.cancel();
        }
        .in_current_span(),
    );

    let heartbeat = tokio::spawn(
        {
            let connection = connection.clone();
            let cancel = cancel.clone();
            let (interval, timeout) = (ctx.heartbeat_interval, ctx.heartbeat_timeout);
            async move {
                if run_heartbeat(connection, interval, timeout, cancel.clone()).await
                    == HeartbeatResult::TimedOut
                {
                    warn!(?timeout, "peer unresponsive, disconnecting");
                    cancel.cancel();
                }
            }
        }
        .in_current_span(),
    );

    if ctx.coordinator.connect(connection.clone()).await.is_err() {
        warn!("coordinator unavailable, closing");
        cancel.cancel();
    }

    loop {
        let msg = tokio::select! {
            () = cancel.cancelled() => break,
            msg = ws_rx.next() => msg,
        };
        let msg = match msg {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(error = %e, "websocket read error");
                break;
            }
            None => break,
        };
        connection.mark_alive();

        let result = match msg {
            Message::Text(text) => dispatch(&connection, Frame::Text(text.as_str()), &ctx).await,
            // Some clients send JSON in binary frames.
            Message::Binary(data) => dispatch(&connection, Frame::Binary(&data), &ctx).await,
            Message::Ping(_) | Message::Pong(_) => Ok(()),
            Message::Close(_) => {
                debug!("peer sent close frame");
                break;
            }
        };
        if result.is_err() {
            warn!("coordinator closed while handling command");
            break;
        }
    }

    cancel.cancel();
    let _ = ctx.coordinator.disconnect(conn_id).await;
    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
    let _ = heartbeat.await;

    info!(
        duration_secs = connection.age().as_secs(),
        dropped = connection.drop_count(),
        "peer disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
}

async fn dispatch(
    connection: &ClientConnection,
    frame: Frame<'_>,
    ctx: &WsContext,
) -> Result<(), CoordinatorError> {
    match handle_message(&connection.id, frame, &ctx.gate) {
        Ok(command) => ctx.coordinator.submit(connection.id.clone(), command).await,
        // Rejections are already logged and counted; nothing goes back on the socket.
        Err(_) => Ok(()),
    }
}
