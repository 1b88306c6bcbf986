use std::fmt;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::error::SessionError;
use super::events::{ServerEvent, SessionRoute};
use crate::core::audio::SharedAudio;
use crate::core::realtime::SharedRealtime;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Opening => write!(f, "opening"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// One client's upstream connection, audio handler and background tasks.
///
/// Sessions are created and destroyed by the
/// [`SessionManager`](super::SessionManager).
pub struct Session {
    client_id: String,
    session_id: Uuid,
    pub(crate) upstream: SharedRealtime,
    pub(crate) audio: SharedAudio,
    routes: mpsc::Sender<SessionRoute>,
    state: RwLock<SessionState>,
    pump: Mutex<Option<JoinHandle<()>>>,
    streamer: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub(crate) fn new(
        client_id: String,
        upstream: SharedRealtime,
        audio: SharedAudio,
        routes: mpsc::Sender<SessionRoute>,
    ) -> Self {
        Self {
            client_id,
            session_id: Uuid::new_v4(),
            upstream,
            audio,
            routes,
            state: RwLock::new(SessionState::Opening),
            pump: Mutex::new(None),
            streamer: Mutex::new(None),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_closing(&self) -> bool {
        matches!(self.state(), SessionState::Closing | SessionState::Closed)
    }

    /// Store the task handles and move to `Active`.
    ///
    /// If a close already started, the tasks are aborted instead and `false`
    /// is returned. Both happen under the state lock, so a task can never be
    /// stored after `close` collected the handles.
    pub(crate) fn activate(&self, pump: JoinHandle<()>, streamer: JoinHandle<()>) -> bool {
        let mut state = self.state.write();
        if *state != SessionState::Opening {
            pump.abort();
            streamer.abort();
            return false;
        }
        *self.pump.lock() = Some(pump);
        *self.streamer.lock() = Some(streamer);
        *state = SessionState::Active;
        true
    }

    /// Move to `Closing`. Only the first caller gets `true`.
    pub(crate) fn begin_close(&self) -> bool {
        let mut state = self.state.write();
        match *state {
            SessionState::Opening | SessionState::Active => {
                *state = SessionState::Closing;
                true
            }
            SessionState::Closing | SessionState::Closed => false,
        }
    }

    pub(crate) fn mark_closed(&self) {
        *self.state.write() = SessionState::Closed;
    }

    pub(crate) fn take_pump(&self) -> Option<JoinHandle<()>> {
        self.pump.lock().take()
    }

    pub(crate) fn take_streamer(&self) -> Option<JoinHandle<()>> {
        self.streamer.lock().take()
    }

    /// Push an event to the client.
    pub(crate) async fn emit(&self, event: ServerEvent) {
        if self.routes.send(event.into()).await.is_err() {
            tracing::debug!(
                client_id = %self.client_id,
                session_id = %self.session_id,
                "Transport gone, dropping event"
            );
        }
    }

    /// Report a background failure to the client unless the session is
    /// already shutting down.
    pub(crate) async fn fail(&self, error: &SessionError) {
        if self.is_closing() {
            tracing::debug!(
                client_id = %self.client_id,
                session_id = %self.session_id,
                "Ignoring error during close: {}",
                error
            );
            return;
        }

        tracing::error!(
            client_id = %self.client_id,
            session_id = %self.session_id,
            "Session failed: {}",
            error
        );
        self.emit(ServerEvent::error(error.to_string())).await;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("client_id", &self.client_id)
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .finish()
    }
}
