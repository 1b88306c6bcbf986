//! Realtime WebSocket handler
//!
//! One WebSocket per client id. The handler opens a session, forwards decoded
//! client messages to the session manager, and drains the session's outbound
//! channel into the socket from a dedicated sender task.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::{select, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::session::{ClientMessage, DispatchOutcome, ServerEvent, Session, SessionRoute};
use crate::state::AppState;

use super::messages::{OutgoingMessage, decode_client_message};

/// Optimized channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// How long queued frames may take to flush once the session is closed
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Realtime WebSocket handler
///
/// Upgrades `GET /ws/{client_id}` to a WebSocket bound to one session.
pub async fn realtime_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!(client_id = %client_id, "Realtime WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_realtime_socket(socket, client_id, state))
}

/// Handle the realtime WebSocket connection
async fn handle_realtime_socket(socket: WebSocket, client_id: String, app_state: Arc<AppState>) {
    info!(client_id = %client_id, "Realtime WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (route_tx, mut route_rx) = mpsc::channel::<SessionRoute>(CHANNEL_BUFFER_SIZE);

    // Cancelled once the session is closed and queued frames should drain
    let shutdown = CancellationToken::new();
    // Cancelled by the sender after an error frame or a failed write
    let fatal = CancellationToken::new();

    // Sender task for outgoing messages
    let sender_task = {
        let shutdown = shutdown.clone();
        let fatal = fatal.clone();
        let client_id = client_id.clone();
        tokio::spawn(async move {
            loop {
                let route = select! {
                    biased;
                    route = route_rx.recv() => match route {
                        Some(route) => route,
                        None => break,
                    },
                    _ = shutdown.cancelled() => break,
                };

                let is_error = route.is_error();
                let result = match route {
                    SessionRoute::Event(event) => {
                        match serde_json::to_string(&OutgoingMessage::from(event)) {
                            Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                            Err(e) => {
                                error!(
                                    client_id = %client_id,
                                    "Failed to serialize outgoing message: {}",
                                    e
                                );
                                continue;
                            }
                        }
                    }
                    SessionRoute::Audio(data) => sender.send(Message::Binary(data)).await,
                };

                if let Err(e) = result {
                    warn!(client_id = %client_id, "Failed to send WebSocket message: {}", e);
                    fatal.cancel();
                    return;
                }

                if is_error {
                    fatal.cancel();
                }
            }

            if let Err(e) = sender.send(Message::Close(None)).await {
                debug!(client_id = %client_id, "Failed to send close frame: {}", e);
            }
        })
    };

    let session = match app_state.sessions.open(&client_id, route_tx.clone()).await {
        Ok(session) => session,
        Err(e) => {
            warn!(client_id = %client_id, "Failed to open session: {}", e);
            let _ = route_tx
                .send(ServerEvent::error(e.to_string()).into())
                .await;
            finish_sender(shutdown, sender_task).await;
            return;
        }
    };
    drop(route_tx);

    loop {
        let frame = select! {
            _ = fatal.cancelled() => {
                info!(client_id = %client_id, "Ending realtime session after error");
                break;
            }
            frame = receiver.next() => frame,
        };

        match frame {
            Some(Ok(msg)) => {
                if !process_realtime_message(msg, &session, &app_state).await {
                    break;
                }
            }
            Some(Err(e)) => {
                warn!(client_id = %client_id, "Realtime WebSocket error: {}", e);
                break;
            }
            None => {
                info!(client_id = %client_id, "Realtime WebSocket connection closed by client");
                break;
            }
        }
    }

    app_state.sessions.close(&session).await;
    finish_sender(shutdown, sender_task).await;

    info!(client_id = %client_id, "Realtime WebSocket connection terminated");
}

/// Process incoming WebSocket message
///
/// Returns `false` when the receive loop should end.
async fn process_realtime_message(
    msg: Message,
    session: &Arc<Session>,
    app_state: &Arc<AppState>,
) -> bool {
    let client_id = session.client_id();

    let message = match msg {
        Message::Text(text) => match decode_client_message(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                warn!(client_id = %client_id, "Dropping client message: {}", e);
                return true;
            }
        },
        Message::Binary(data) => {
            debug!(client_id = %client_id, "Received binary audio: {} bytes", data.len());
            ClientMessage::Audio(data)
        }
        Message::Close(frame) => {
            info!(client_id = %client_id, ?frame, "Client sent close frame");
            return false;
        }
        Message::Ping(_) | Message::Pong(_) => return true,
    };

    match app_state.sessions.dispatch(session, message).await {
        Ok(DispatchOutcome::Continue) => true,
        Ok(DispatchOutcome::Stop) => false,
        Err(e) => {
            session.fail(&e).await;
            false
        }
    }
}

/// Let queued frames flush, then stop the sender task.
async fn finish_sender(shutdown: CancellationToken, sender_task: JoinHandle<()>) {
    shutdown.cancel();
    let abort = sender_task.abort_handle();
    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, sender_task)
        .await
        .is_err()
    {
        abort.abort();
    }
}
