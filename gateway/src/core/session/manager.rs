//! Session registry and lifecycle.
//!
//! The manager owns every live [`Session`], keyed by client id. Opening a
//! session wires an upstream client and an audio handler together and spawns
//! two background tasks:
//!
//! - the message pump, which pulls upstream events and routes them (text to
//!   the client, audio to the audio handler, interrupts to playback, tool
//!   calls to the tool registry);
//! - the audio streamer, which forwards locally captured audio upstream.
//!
//! Closing a session stops streaming, releases audio, closes the upstream,
//! aborts the pump and removes the registry entry, in that order. Every step
//! runs even if an earlier one fails.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::error::{SessionError, SessionResult};
use super::events::{ClientMessage, ServerEvent, SessionRoute};
use super::handle::Session;
use crate::core::audio::{AudioIoFactory, BrowserAudioFactory};
use crate::core::realtime::{
    FunctionCallRequest, OpenAIRealtimeFactory, RealtimeConfig, RealtimeError, RealtimeEvent,
    RealtimeFactory, TurnDetectionConfig,
};
use crate::core::tools::ToolRegistry;

/// Default bound on establishing the upstream connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What the transport should do after a message was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    Stop,
}

struct ManagerInner {
    sessions: DashMap<String, Arc<Session>>,
    realtime_config: RealtimeConfig,
    connect_timeout: Option<Duration>,
    tools: ToolRegistry,
    upstream_factory: Arc<dyn RealtimeFactory>,
    audio_factory: Arc<dyn AudioIoFactory>,
}

/// Owns at most one session per client id.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder {
    realtime_config: RealtimeConfig,
    connect_timeout: Option<Duration>,
    tools: ToolRegistry,
    upstream_factory: Arc<dyn RealtimeFactory>,
    audio_factory: Arc<dyn AudioIoFactory>,
}

impl SessionManagerBuilder {
    /// Tools advertised to every session.
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Bound on the upstream connect; `None` waits indefinitely.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn upstream_factory(mut self, factory: Arc<dyn RealtimeFactory>) -> Self {
        self.upstream_factory = factory;
        self
    }

    pub fn audio_factory(mut self, factory: Arc<dyn AudioIoFactory>) -> Self {
        self.audio_factory = factory;
        self
    }

    pub fn build(self) -> SessionManager {
        SessionManager {
            inner: Arc::new(ManagerInner {
                sessions: DashMap::new(),
                realtime_config: self.realtime_config,
                connect_timeout: self.connect_timeout,
                tools: self.tools,
                upstream_factory: self.upstream_factory,
                audio_factory: self.audio_factory,
            }),
        }
    }
}

impl SessionManager {
    /// Start building a manager whose sessions use `realtime_config` as a
    /// template. Defaults: OpenAI upstream, browser audio, no tools, 10s
    /// connect timeout.
    pub fn builder(realtime_config: RealtimeConfig) -> SessionManagerBuilder {
        SessionManagerBuilder {
            realtime_config,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            tools: ToolRegistry::new(),
            upstream_factory: Arc::new(OpenAIRealtimeFactory),
            audio_factory: Arc::new(BrowserAudioFactory),
        }
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.inner.sessions.contains_key(client_id)
    }

    pub fn get(&self, client_id: &str) -> Option<Arc<Session>> {
        self.inner
            .sessions
            .get(client_id)
            .map(|entry| entry.value().clone())
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }

    fn session_config(&self) -> RealtimeConfig {
        let tools = self.inner.tools.definitions();
        RealtimeConfig {
            turn_detection: Some(TurnDetectionConfig::default()),
            tools: (!tools.is_empty()).then_some(tools),
            ..self.inner.realtime_config.clone()
        }
    }

    /// Open a session for `client_id`. Events for the client are pushed on
    /// `routes` in emission order.
    pub async fn open(
        &self,
        client_id: &str,
        routes: mpsc::Sender<SessionRoute>,
    ) -> SessionResult<Arc<Session>> {
        let upstream = self
            .inner
            .upstream_factory
            .create(self.session_config())
            .map_err(SessionError::UpstreamConnect)?;
        let audio = self.inner.audio_factory.create(client_id, routes.clone())?;

        let session = Arc::new(Session::new(
            client_id.to_string(),
            upstream,
            audio,
            routes,
        ));

        let duplicate = match self.inner.sessions.entry(client_id.to_string()) {
            Entry::Occupied(_) => true,
            Entry::Vacant(entry) => {
                entry.insert(session.clone());
                false
            }
        };
        if duplicate {
            warn!(client_id, "Rejecting duplicate session");
            if let Err(e) = session.audio.cleanup() {
                warn!(client_id, "Failed to release audio of rejected session: {}", e);
            }
            return Err(SessionError::DuplicateSession(client_id.to_string()));
        }

        info!(
            client_id,
            session_id = %session.session_id(),
            "Connecting upstream session"
        );

        if let Err(e) = self.connect_upstream(&session).await {
            error!(
                client_id,
                session_id = %session.session_id(),
                "Upstream connect failed: {}",
                e
            );
            self.close(&session).await;
            return Err(SessionError::UpstreamConnect(e));
        }

        let pump = tokio::spawn(run_message_pump(self.clone(), session.clone()));
        let streamer = tokio::spawn(run_audio_streamer(self.clone(), session.clone()));

        if !session.activate(pump, streamer) {
            // Closed while connecting; the socket only went live after close ran
            warn!(
                client_id,
                session_id = %session.session_id(),
                "Session closed while opening, releasing upstream"
            );
            if let Err(e) = session.upstream.close().await {
                warn!(
                    client_id,
                    session_id = %session.session_id(),
                    "Failed to close upstream: {}",
                    e
                );
            }
            return Err(SessionError::UpstreamConnect(RealtimeError::ConnectionClosed(
                "session closed while opening".to_string(),
            )));
        }

        info!(
            client_id,
            session_id = %session.session_id(),
            active_sessions = self.active_sessions(),
            "Session opened"
        );
        Ok(session)
    }

    async fn connect_upstream(&self, session: &Session) -> Result<(), RealtimeError> {
        match self.inner.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, session.upstream.connect())
                .await
                .unwrap_or_else(|_| {
                    Err(RealtimeError::Timeout(format!(
                        "upstream connect exceeded {}s",
                        timeout.as_secs_f32()
                    )))
                }),
            None => session.upstream.connect().await,
        }
    }

    /// Apply one client message to its session.
    pub async fn dispatch(
        &self,
        session: &Session,
        message: ClientMessage,
    ) -> SessionResult<DispatchOutcome> {
        match message {
            ClientMessage::Audio(bytes) => {
                debug!(
                    client_id = %session.client_id(),
                    bytes = bytes.len(),
                    "Forwarding audio upstream"
                );
                session
                    .upstream
                    .send_audio(bytes)
                    .await
                    .map_err(SessionError::UpstreamRuntime)?;
                Ok(DispatchOutcome::Continue)
            }
            ClientMessage::StopCommand => {
                info!(
                    client_id = %session.client_id(),
                    session_id = %session.session_id(),
                    "Stop command received"
                );
                Ok(DispatchOutcome::Stop)
            }
        }
    }

    /// Tear a session down. Idempotent and safe after a partial open.
    pub async fn close(&self, session: &Arc<Session>) {
        if !session.begin_close() {
            debug!(client_id = %session.client_id(), "Session already closing");
            return;
        }

        let client_id = session.client_id();
        let session_id = session.session_id();

        session.audio.stop_streaming();
        if let Some(streamer) = session.take_streamer() {
            streamer.abort();
        }

        if let Err(e) = session.audio.cleanup() {
            warn!(client_id, %session_id, "Failed to release audio: {}", e);
        }

        if let Err(e) = session.upstream.close().await {
            warn!(client_id, %session_id, "Failed to close upstream: {}", e);
        }

        if let Some(pump) = session.take_pump() {
            pump.abort();
        }

        let removed = self
            .inner
            .sessions
            .remove_if(client_id, |_, current| Arc::ptr_eq(current, session))
            .is_some();

        session.mark_closed();
        info!(
            client_id,
            %session_id,
            removed,
            active_sessions = self.active_sessions(),
            "Session closed"
        );
    }

    /// Close every live session.
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for session in sessions {
            self.close(&session).await;
        }
    }

    /// Close from a background task without being cancelled by its own abort.
    fn spawn_close(&self, session: Arc<Session>) {
        let manager = self.clone();
        tokio::spawn(async move { manager.close(&session).await });
    }

    async fn pump_events(&self, session: &Session) -> SessionResult<()> {
        loop {
            match session.upstream.next_event().await {
                Some(Ok(event)) => self.route_event(session, event).await?,
                Some(Err(e)) => return Err(SessionError::UpstreamRuntime(e)),
                None if session.is_closing() => return Ok(()),
                None => {
                    return Err(SessionError::UpstreamRuntime(
                        RealtimeError::ConnectionClosed("upstream ended the session".to_string()),
                    ));
                }
            }
        }
    }

    async fn route_event(&self, session: &Session, event: RealtimeEvent) -> SessionResult<()> {
        match event {
            RealtimeEvent::TextDelta(text) => {
                session.emit(ServerEvent::TextDelta { text }).await;
            }
            RealtimeEvent::AudioDelta(audio) => {
                if let Err(e) = session.audio.play_audio(audio).await {
                    debug!(client_id = %session.client_id(), "Audio playback dropped: {}", e);
                }
            }
            RealtimeEvent::Interrupt => {
                session.audio.stop_playback_immediately();
            }
            RealtimeEvent::FunctionCall(call) => {
                self.invoke_tool(session, call).await?;
            }
            RealtimeEvent::ResponseDone(response_id) => {
                debug!(client_id = %session.client_id(), %response_id, "Response done");
            }
        }
        Ok(())
    }

    async fn invoke_tool(&self, session: &Session, call: FunctionCallRequest) -> SessionResult<()> {
        let output = match self.inner.tools.invoke(&call.name, &call.arguments) {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    client_id = %session.client_id(),
                    tool = %call.name,
                    "Tool call failed: {}",
                    e
                );
                serde_json::json!({ "error": e.to_string() }).to_string()
            }
        };

        info!(
            client_id = %session.client_id(),
            tool = %call.name,
            call_id = %call.call_id,
            "Tool invoked"
        );

        session
            .upstream
            .submit_function_result(&call.call_id, &output)
            .await
            .map_err(SessionError::UpstreamRuntime)?;
        session
            .upstream
            .create_response()
            .await
            .map_err(SessionError::UpstreamRuntime)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("active_sessions", &self.active_sessions())
            .field("connect_timeout", &self.inner.connect_timeout)
            .field("tools", &self.inner.tools)
            .finish()
    }
}

async fn run_message_pump(manager: SessionManager, session: Arc<Session>) {
    match manager.pump_events(&session).await {
        Ok(()) => debug!(client_id = %session.client_id(), "Message pump finished"),
        Err(e) => {
            session.fail(&e).await;
            manager.spawn_close(session);
        }
    }
}

async fn run_audio_streamer(manager: SessionManager, session: Arc<Session>) {
    let upstream = session.upstream.clone();
    match session.audio.start_streaming(upstream).await {
        Ok(()) => debug!(client_id = %session.client_id(), "Audio streamer finished"),
        Err(e) => {
            session.fail(&SessionError::UpstreamRuntime(e)).await;
            manager.spawn_close(session);
        }
    }
}
