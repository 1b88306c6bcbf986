//! Audio I/O for a session.
//!
//! An audio handler plays assistant audio and, when it owns a capture source,
//! streams captured audio upstream. [`BrowserAudio`] has no local capture:
//! microphone audio reaches the session through client `audio` messages, and
//! playback is delegated to the browser by forwarding audio as binary frames.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::realtime::{RealtimeAudioData, RealtimeResult, SharedRealtime};
use crate::core::session::SessionRoute;

/// Errors from audio handlers.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The playback sink is gone
    #[error("Audio output closed for client: {0}")]
    OutputClosed(String),

    /// The capture or playback device failed
    #[error("Audio device error: {0}")]
    Device(String),
}

/// Audio I/O for one session.
#[async_trait]
pub trait AudioIo: Send + Sync {
    /// Wait for the next captured chunk. `None` ends streaming.
    async fn next_chunk(&self) -> Option<Bytes>;

    /// Forward captured audio upstream until streaming is stopped.
    async fn start_streaming(&self, upstream: SharedRealtime) -> RealtimeResult<()> {
        while let Some(chunk) = self.next_chunk().await {
            upstream.send_audio(chunk).await?;
        }
        Ok(())
    }

    /// Stop capture; `start_streaming` returns soon after.
    fn stop_streaming(&self);

    /// Queue assistant audio for playback.
    async fn play_audio(&self, audio: RealtimeAudioData) -> Result<(), AudioError>;

    /// Drop whatever is playing now (the user started talking).
    fn stop_playback_immediately(&self);

    /// Release audio resources. Safe to call more than once.
    fn cleanup(&self) -> Result<(), AudioError>;
}

pub type SharedAudio = Arc<dyn AudioIo>;

/// Creates an audio handler for a new session.
pub trait AudioIoFactory: Send + Sync {
    fn create(
        &self,
        client_id: &str,
        routes: mpsc::Sender<SessionRoute>,
    ) -> Result<SharedAudio, AudioError>;
}

/// Audio handler that plays through the client's browser.
pub struct BrowserAudio {
    client_id: String,
    routes: mpsc::Sender<SessionRoute>,
    capture: CancellationToken,
    /// Response currently being played
    current_response: Mutex<Option<String>>,
    /// Response cut off by an interrupt; its remaining deltas are dropped
    muted_response: Mutex<Option<String>>,
    released: AtomicBool,
}

impl BrowserAudio {
    pub fn new(client_id: impl Into<String>, routes: mpsc::Sender<SessionRoute>) -> Self {
        Self {
            client_id: client_id.into(),
            routes,
            capture: CancellationToken::new(),
            current_response: Mutex::new(None),
            muted_response: Mutex::new(None),
            released: AtomicBool::new(false),
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn is_muted(&self, response_id: Option<&str>) -> bool {
        match (response_id, self.muted_response.lock().as_deref()) {
            (Some(id), Some(muted)) => id == muted,
            _ => false,
        }
    }
}

#[async_trait]
impl AudioIo for BrowserAudio {
    async fn next_chunk(&self) -> Option<Bytes> {
        self.capture.cancelled().await;
        None
    }

    fn stop_streaming(&self) {
        self.capture.cancel();
    }

    async fn play_audio(&self, audio: RealtimeAudioData) -> Result<(), AudioError> {
        if self.is_released() {
            tracing::debug!(client_id = %self.client_id, "Dropping audio after cleanup");
            return Ok(());
        }
        if self.is_muted(audio.response_id.as_deref()) {
            return Ok(());
        }

        *self.current_response.lock() = audio.response_id.clone();

        self.routes
            .send(SessionRoute::Audio(audio.data))
            .await
            .map_err(|_| AudioError::OutputClosed(self.client_id.clone()))
    }

    fn stop_playback_immediately(&self) {
        let current = self.current_response.lock().take();
        if current.is_some() {
            tracing::debug!(
                client_id = %self.client_id,
                response_id = ?current,
                "Playback interrupted"
            );
        }
        *self.muted_response.lock() = current;
    }

    fn cleanup(&self) -> Result<(), AudioError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.capture.cancel();
        self.current_response.lock().take();
        self.muted_response.lock().take();
        tracing::debug!(client_id = %self.client_id, "Released browser audio");
        Ok(())
    }
}

/// Creates [`BrowserAudio`] handlers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserAudioFactory;

impl AudioIoFactory for BrowserAudioFactory {
    fn create(
        &self,
        client_id: &str,
        routes: mpsc::Sender<SessionRoute>,
    ) -> Result<SharedAudio, AudioError> {
        Ok(Arc::new(BrowserAudio::new(client_id, routes)))
    }
}
