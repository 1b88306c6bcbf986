//! OpenAI Realtime API client implementation.
//!
//! This module provides the OpenAI Realtime client that implements the `BaseRealtime` trait
//! using OpenAI's WebSocket-based Realtime API.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! Outgoing events go through a channel drained by a writer task that owns the
//! sink half of the socket. The stream half is read directly by
//! [`BaseRealtime::next_event`], so upstream events are never buffered twice.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use super::config::{
    OPENAI_REALTIME_AUDIO_FORMAT, OPENAI_REALTIME_DEFAULT_MODEL, OPENAI_REALTIME_SAMPLE_RATE,
    OPENAI_REALTIME_URL, OpenAIRealtimeVoice,
};
use super::messages::{ClientEvent, ConversationItem, ServerEvent, SessionConfig, ToolDef};
use crate::core::realtime::base::{
    BaseRealtime, ConnectionState, FunctionCallRequest, RealtimeAudioData, RealtimeConfig,
    RealtimeError, RealtimeEvent, RealtimeFactory, RealtimeResult, SharedRealtime,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// OpenAI Realtime Client
// =============================================================================

/// OpenAI Realtime API client implementation.
///
/// The `connected` flag uses `Arc<AtomicBool>` for lock-free status checks and
/// is shared with the writer task, which clears it when the socket fails.
pub struct OpenAIRealtime {
    /// Configuration
    config: RealtimeConfig,
    /// Parsed voice
    voice: OpenAIRealtimeVoice,
    /// Connection state
    state: Arc<RwLock<ConnectionState>>,
    /// Connected flag for fast checks (shared with the writer task)
    connected: Arc<AtomicBool>,
    /// Session ID reported by `session.created`
    session_id: RwLock<Option<String>>,

    /// Outgoing message channel, `None` until connected and after close
    ws_sender: Mutex<Option<mpsc::Sender<Message>>>,
    /// Read half of the socket, consumed by `next_event`
    ws_stream: tokio::sync::Mutex<Option<SplitStream<WsStream>>>,
    /// Writer task handle
    writer_handle: Mutex<Option<JoinHandle<()>>>,

    /// Pending function calls: maps call_id -> function_name
    /// Populated by OutputItemAdded event, consumed by FunctionCallArgumentsDone event.
    pending_function_calls: Mutex<HashMap<String, String>>,
}

impl OpenAIRealtime {
    /// Create a client. The API key is required; nothing is connected yet.
    pub fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let voice = config
            .voice
            .as_deref()
            .map(OpenAIRealtimeVoice::from_str_or_default)
            .unwrap_or_default();

        Ok(Self {
            config,
            voice,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            session_id: RwLock::new(None),
            ws_sender: Mutex::new(None),
            ws_stream: tokio::sync::Mutex::new(None),
            writer_handle: Mutex::new(None),
            pending_function_calls: Mutex::new(HashMap::new()),
        })
    }

    /// Get the session ID if the server reported one.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    fn model(&self) -> &str {
        if self.config.model.is_empty() {
            OPENAI_REALTIME_DEFAULT_MODEL
        } else {
            &self.config.model
        }
    }

    /// Build the WebSocket URL with model parameter.
    fn build_ws_url(&self) -> RealtimeResult<Url> {
        let base = if self.config.url.is_empty() {
            OPENAI_REALTIME_URL
        } else {
            &self.config.url
        };
        let mut url = Url::parse(base)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("{base}: {e}")))?;
        url.query_pairs_mut().append_pair("model", self.model());
        Ok(url)
    }

    /// Build the initial session configuration.
    fn build_session_config(&self) -> SessionConfig {
        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            voice: Some(self.voice.as_str().to_string()),
            instructions: self.config.instructions.clone(),
            input_audio_format: Some(OPENAI_REALTIME_AUDIO_FORMAT.to_string()),
            output_audio_format: Some(OPENAI_REALTIME_AUDIO_FORMAT.to_string()),
            turn_detection: self.config.turn_detection.clone(),
            tools: self
                .config
                .tools
                .as_ref()
                .filter(|tools| !tools.is_empty())
                .map(|tools| tools.iter().map(ToolDef::from).collect()),
            tool_choice: self
                .config
                .tools
                .as_ref()
                .filter(|tools| !tools.is_empty())
                .map(|_| "auto".to_string()),
        }
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let mut state = self.state.write();
        if *state == ConnectionState::Connected {
            *state = ConnectionState::Disconnected;
        }
    }

    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        let sender = self
            .ws_sender
            .lock()
            .clone()
            .ok_or(RealtimeError::NotConnected)?;

        let json = serde_json::to_string(&event)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;

        sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| RealtimeError::ConnectionClosed("writer task stopped".to_string()))
    }

    /// Translate a server event into a relay event.
    ///
    /// Returns `None` for events that only update client state or are ignored.
    fn handle_server_event(&self, event: ServerEvent) -> Option<RealtimeEvent> {
        match event {
            ServerEvent::SessionCreated { session } => {
                tracing::info!(session_id = %session.id, "OpenAI Realtime session created");
                *self.session_id.write() = Some(session.id);
                None
            }

            // Rejected requests and similar protocol errors leave the session usable.
            ServerEvent::Error { error } => {
                tracing::warn!(
                    error_type = %error.error_type,
                    code = ?error.code,
                    "OpenAI Realtime error: {}",
                    error.message
                );
                None
            }

            ServerEvent::SpeechStarted { item_id } => {
                tracing::debug!(?item_id, "Speech started");
                Some(RealtimeEvent::Interrupt)
            }

            ServerEvent::TextDelta { delta } | ServerEvent::AudioTranscriptDelta { delta } => {
                Some(RealtimeEvent::TextDelta(delta))
            }

            ServerEvent::AudioDelta {
                delta,
                item_id,
                response_id,
            } => match ServerEvent::decode_audio_delta(&delta) {
                Ok(audio_bytes) => Some(RealtimeEvent::AudioDelta(RealtimeAudioData {
                    data: Bytes::from(audio_bytes),
                    sample_rate: OPENAI_REALTIME_SAMPLE_RATE,
                    item_id,
                    response_id,
                })),
                Err(e) => {
                    tracing::error!("Failed to decode audio delta: {}", e);
                    None
                }
            },

            // Track function calls when output items are added.
            // FunctionCallArgumentsDone may arrive without the function name.
            ServerEvent::OutputItemAdded { item, .. } => {
                if item.item_type == "function_call"
                    && let (Some(call_id), Some(name)) = (item.call_id, item.name)
                {
                    tracing::debug!("Tracking function call: call_id={}, name={}", call_id, name);
                    self.pending_function_calls.lock().insert(call_id, name);
                }
                None
            }

            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
                item_id,
            } => {
                let tracked = self.pending_function_calls.lock().remove(&call_id);
                let name = tracked.or(name).unwrap_or_else(|| {
                    tracing::warn!("Function name not found for call_id: {}", call_id);
                    String::new()
                });

                tracing::debug!(
                    "Function call complete: name={}, call_id={}, args={}",
                    name,
                    call_id,
                    arguments
                );

                Some(RealtimeEvent::FunctionCall(FunctionCallRequest {
                    call_id,
                    name,
                    arguments,
                    item_id,
                }))
            }

            ServerEvent::ResponseDone { response } => {
                tracing::debug!("Response done: {}", response.id);
                Some(RealtimeEvent::ResponseDone(response.id))
            }

            ServerEvent::Unknown => {
                tracing::trace!("Unhandled server event");
                None
            }
        }
    }
}

#[async_trait]
impl BaseRealtime for OpenAIRealtime {
    async fn connect(&self) -> RealtimeResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        *self.state.write() = ConnectionState::Connecting;

        let url = self.build_ws_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?,
        );
        headers.insert("openai-beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = match tokio_tungstenite::connect_async(request).await {
            Ok(conn) => conn,
            Err(e) => {
                *self.state.write() = ConnectionState::Failed;
                return Err(RealtimeError::ConnectionFailed(e.to_string()));
            }
        };

        tracing::info!(model = %self.model(), "Connected to OpenAI Realtime API");

        let (mut ws_sink, ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<Message>(WS_CHANNEL_CAPACITY);

        let connected = self.connected.clone();
        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = ws_sink.send(message).await {
                    tracing::error!("Failed to send WebSocket message: {}", e);
                    connected.store(false, Ordering::SeqCst);
                    return;
                }
            }

            // Sender dropped: close the socket politely.
            if let Err(e) = ws_sink.send(Message::Close(None)).await {
                tracing::debug!("Failed to send close frame: {}", e);
            }
            if let Err(e) = ws_sink.close().await {
                tracing::debug!("Failed to close WebSocket sink: {}", e);
            }
        });

        *self.ws_stream.lock().await = Some(ws_stream);
        *self.ws_sender.lock() = Some(tx);
        *self.writer_handle.lock() = Some(handle);

        self.connected.store(true, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Connected;

        self.send_event(ClientEvent::SessionUpdate {
            session: self.build_session_config(),
        })
        .await
    }

    async fn close(&self) -> RealtimeResult<()> {
        // Dropping the sender lets the writer flush and send a close frame.
        let had_sender = self.ws_sender.lock().take().is_some();
        self.writer_handle.lock().take();
        self.pending_function_calls.lock().clear();
        self.connected.store(false, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Disconnected;

        if had_sender {
            tracing::info!("Closed OpenAI Realtime connection");
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn get_connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn send_audio(&self, audio_data: Bytes) -> RealtimeResult<()> {
        if audio_data.is_empty() {
            return Ok(());
        }
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        self.send_event(ClientEvent::audio_append(&audio_data)).await
    }

    async fn submit_function_result(&self, call_id: &str, result: &str) -> RealtimeResult<()> {
        self.send_event(ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_call_output(call_id, result),
        })
        .await
    }

    async fn create_response(&self) -> RealtimeResult<()> {
        self.send_event(ClientEvent::ResponseCreate).await
    }

    async fn next_event(&self) -> Option<RealtimeResult<RealtimeEvent>> {
        let mut guard = self.ws_stream.lock().await;
        let stream = guard.as_mut()?;

        loop {
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    *guard = None;
                    self.mark_disconnected();
                    return Some(Err(RealtimeError::WebSocketError(e.to_string())));
                }
                None => {
                    *guard = None;
                    self.mark_disconnected();
                    return None;
                }
            };

            match message {
                Message::Text(text) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => {
                        if let Some(event) = self.handle_server_event(event) {
                            return Some(Ok(event));
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse server event: {} - {}", e, text);
                    }
                },
                Message::Close(frame) => {
                    tracing::info!(?frame, "WebSocket closed by server");
                    *guard = None;
                    self.mark_disconnected();
                    return None;
                }
                _ => {}
            }
        }
    }

    fn get_provider_info(&self) -> serde_json::Value {
        serde_json::json!({
            "provider": "openai",
            "model": self.model(),
            "voice": self.voice.as_str(),
            "audio_format": OPENAI_REALTIME_AUDIO_FORMAT,
            "sample_rate": OPENAI_REALTIME_SAMPLE_RATE,
        })
    }
}

/// Creates [`OpenAIRealtime`] clients for new sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAIRealtimeFactory;

impl RealtimeFactory for OpenAIRealtimeFactory {
    fn create(&self, config: RealtimeConfig) -> RealtimeResult<SharedRealtime> {
        Ok(Arc::new(OpenAIRealtime::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use base64::prelude::*;

    use super::*;
    use crate::core::realtime::base::{ToolDefinition, TurnDetectionConfig};
    use crate::core::realtime::openai::messages::{ApiError, Response, Session};

    fn test_config() -> RealtimeConfig {
        RealtimeConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = OpenAIRealtime::new(RealtimeConfig::default());
        assert!(matches!(
            result,
            Err(RealtimeError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_ws_url_uses_default_model() {
        let client = OpenAIRealtime::new(test_config()).unwrap();
        let url = client.build_ws_url().unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
    }

    #[test]
    fn test_ws_url_override() {
        let config = RealtimeConfig {
            url: "ws://127.0.0.1:9000/v1/realtime".to_string(),
            model: "gpt-4o-mini-realtime-preview".to_string(),
            ..test_config()
        };
        let client = OpenAIRealtime::new(config).unwrap();
        let url = client.build_ws_url().unwrap();
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.query(), Some("model=gpt-4o-mini-realtime-preview"));
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        let config = RealtimeConfig {
            url: "not a url".to_string(),
            ..test_config()
        };
        let client = OpenAIRealtime::new(config).unwrap();
        assert!(matches!(
            client.build_ws_url(),
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_session_config_includes_tools_and_vad() {
        let config = RealtimeConfig {
            voice: Some("echo".to_string()),
            turn_detection: Some(TurnDetectionConfig::default()),
            tools: Some(vec![ToolDefinition::function(
                "get_phone_number",
                "Get a phone number",
                serde_json::json!({"type": "object"}),
            )]),
            ..test_config()
        };
        let client = OpenAIRealtime::new(config).unwrap();
        let session = client.build_session_config();

        assert_eq!(session.voice.as_deref(), Some("echo"));
        assert_eq!(session.tool_choice.as_deref(), Some("auto"));
        let tools = session.tools.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_phone_number");
        assert!(matches!(
            session.turn_detection,
            Some(TurnDetectionConfig::ServerVad { .. })
        ));
    }

    #[test]
    fn test_initial_state() {
        let client = OpenAIRealtime::new(test_config()).unwrap();
        assert!(!client.is_ready());
        assert_eq!(
            client.get_connection_state(),
            ConnectionState::Disconnected
        );
        assert_eq!(client.get_provider_info()["provider"], "openai");
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let client = OpenAIRealtime::new(test_config()).unwrap();
        let result = client.send_audio(Bytes::from_static(&[1, 2])).await;
        assert!(matches!(result, Err(RealtimeError::NotConnected)));

        // Empty audio is a no-op even when disconnected
        assert!(client.send_audio(Bytes::new()).await.is_ok());
        assert!(matches!(
            client.create_response().await,
            Err(RealtimeError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_next_event_before_connect_is_none() {
        let client = OpenAIRealtime::new(test_config()).unwrap();
        assert!(client.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let client = OpenAIRealtime::new(test_config()).unwrap();
        assert!(client.close().await.is_ok());
        assert!(client.close().await.is_ok());
    }

    #[test]
    fn test_text_and_transcript_deltas() {
        let client = OpenAIRealtime::new(test_config()).unwrap();
        let text = client.handle_server_event(ServerEvent::TextDelta {
            delta: "A".to_string(),
        });
        assert!(matches!(text, Some(RealtimeEvent::TextDelta(t)) if t == "A"));

        let transcript = client.handle_server_event(ServerEvent::AudioTranscriptDelta {
            delta: "B".to_string(),
        });
        assert!(matches!(transcript, Some(RealtimeEvent::TextDelta(t)) if t == "B"));
    }

    #[test]
    fn test_audio_delta_decoded() {
        let client = OpenAIRealtime::new(test_config()).unwrap();
        let event = client.handle_server_event(ServerEvent::AudioDelta {
            delta: BASE64_STANDARD.encode([1u8, 2, 3]),
            item_id: Some("item".to_string()),
            response_id: Some("resp".to_string()),
        });
        match event {
            Some(RealtimeEvent::AudioDelta(audio)) => {
                assert_eq!(audio.data.as_ref(), &[1, 2, 3]);
                assert_eq!(audio.sample_rate, 24000);
                assert_eq!(audio.response_id.as_deref(), Some("resp"));
            }
            other => panic!("Expected AudioDelta, got {other:?}"),
        }

        let bad = client.handle_server_event(ServerEvent::AudioDelta {
            delta: "***".to_string(),
            item_id: None,
            response_id: None,
        });
        assert!(bad.is_none());
    }

    #[test]
    fn test_function_call_tracking() {
        let client = OpenAIRealtime::new(test_config()).unwrap();
        let added = client.handle_server_event(ServerEvent::OutputItemAdded {
            response_id: "resp".to_string(),
            item: ConversationItem {
                item_type: "function_call".to_string(),
                call_id: Some("call_1".to_string()),
                name: Some("get_phone_number".to_string()),
                ..Default::default()
            },
        });
        assert!(added.is_none());

        let done = client.handle_server_event(ServerEvent::FunctionCallArgumentsDone {
            item_id: None,
            call_id: "call_1".to_string(),
            name: None,
            arguments: r#"{"name":"Jerry"}"#.to_string(),
        });
        match done {
            Some(RealtimeEvent::FunctionCall(call)) => {
                assert_eq!(call.name, "get_phone_number");
                assert_eq!(call.call_id, "call_1");
            }
            other => panic!("Expected FunctionCall, got {other:?}"),
        }
        assert!(client.pending_function_calls.lock().is_empty());
    }

    #[test]
    fn test_state_only_events() {
        let client = OpenAIRealtime::new(test_config()).unwrap();
        let created = client.handle_server_event(ServerEvent::SessionCreated {
            session: Session {
                id: "sess_1".to_string(),
                model: None,
            },
        });
        assert!(created.is_none());
        assert_eq!(client.session_id().as_deref(), Some("sess_1"));

        let error = client.handle_server_event(ServerEvent::Error {
            error: ApiError {
                error_type: "invalid_request_error".to_string(),
                code: None,
                message: "bad".to_string(),
            },
        });
        assert!(error.is_none());

        let interrupt =
            client.handle_server_event(ServerEvent::SpeechStarted { item_id: None });
        assert!(matches!(interrupt, Some(RealtimeEvent::Interrupt)));

        let done = client.handle_server_event(ServerEvent::ResponseDone {
            response: Response {
                id: "resp_1".to_string(),
                status: None,
            },
        });
        assert!(matches!(done, Some(RealtimeEvent::ResponseDone(id)) if id == "resp_1"));
    }
}
