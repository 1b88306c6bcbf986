//! Shared test doubles for the session and gateway tests
//!
//! - `MockUpstream` / `MockUpstreamFactory`: scripted upstream driven by the test
//! - `RecordingAudio` / `RecordingAudioFactory`: audio handler that logs calls
//!
//! Both write to a shared `CallLog` so tests can assert on call order.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use realtime_relay::core::audio::{AudioError, AudioIo, AudioIoFactory, SharedAudio};
use realtime_relay::core::realtime::{
    BaseRealtime, ConnectionState, RealtimeAudioData, RealtimeConfig, RealtimeError,
    RealtimeEvent, RealtimeFactory, RealtimeResult, SharedRealtime,
};
use realtime_relay::core::session::{SessionManager, SessionRoute};

/// Ordered record of calls made on the doubles.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

/// How `MockUpstream::connect` behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    Succeed,
    Fail,
    Hang,
    /// Wait for `MockUpstreamFactory::release` before connecting.
    Gated,
}

pub struct MockUpstream {
    log: CallLog,
    behavior: ConnectBehavior,
    observer: Arc<Mutex<Option<SessionManager>>>,
    gate: Arc<Notify>,
    config: RealtimeConfig,
    events_tx: mpsc::UnboundedSender<RealtimeEvent>,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<RealtimeEvent>>,
    closed: CancellationToken,
    ended: CancellationToken,
}

impl MockUpstream {
    /// Queue an upstream event for the session's message pump.
    pub fn push(&self, event: RealtimeEvent) {
        let _ = self.events_tx.send(event);
    }

    /// End the event stream as if the upstream hung up.
    pub fn end(&self) {
        self.ended.cancel();
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl BaseRealtime for MockUpstream {
    async fn connect(&self) -> RealtimeResult<()> {
        self.log.push("upstream.connect");
        match self.behavior {
            ConnectBehavior::Succeed => Ok(()),
            ConnectBehavior::Fail => Err(RealtimeError::ConnectionFailed(
                "connection refused".to_string(),
            )),
            ConnectBehavior::Hang => std::future::pending().await,
            ConnectBehavior::Gated => {
                self.gate.notified().await;
                self.log.push("upstream.connected");
                Ok(())
            }
        }
    }

    async fn close(&self) -> RealtimeResult<()> {
        match self.observer.lock().as_ref() {
            Some(manager) => self.log.push(format!(
                "upstream.close active={}",
                manager.active_sessions()
            )),
            None => self.log.push("upstream.close"),
        }
        self.closed.cancel();
        Ok(())
    }

    fn is_ready(&self) -> bool {
        !self.closed.is_cancelled()
    }

    fn get_connection_state(&self) -> ConnectionState {
        if self.closed.is_cancelled() {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        }
    }

    async fn send_audio(&self, audio_data: Bytes) -> RealtimeResult<()> {
        self.log.push(format!("upstream.audio:{}", audio_data.len()));
        Ok(())
    }

    async fn submit_function_result(&self, call_id: &str, result: &str) -> RealtimeResult<()> {
        self.log
            .push(format!("upstream.function_result:{call_id}:{result}"));
        Ok(())
    }

    async fn create_response(&self) -> RealtimeResult<()> {
        self.log.push("upstream.response_create");
        Ok(())
    }

    async fn next_event(&self) -> Option<RealtimeResult<RealtimeEvent>> {
        let mut events = self.events.lock().await;
        tokio::select! {
            _ = self.closed.cancelled() => None,
            _ = self.ended.cancelled() => None,
            event = events.recv() => event.map(Ok),
        }
    }

    fn get_provider_info(&self) -> serde_json::Value {
        serde_json::json!({ "provider": "mock" })
    }
}

pub struct MockUpstreamFactory {
    log: CallLog,
    behavior: ConnectBehavior,
    observer: Arc<Mutex<Option<SessionManager>>>,
    gate: Arc<Notify>,
    created: Mutex<Vec<Arc<MockUpstream>>>,
}

impl MockUpstreamFactory {
    pub fn new(log: CallLog, behavior: ConnectBehavior) -> Arc<Self> {
        Arc::new(Self {
            log,
            behavior,
            observer: Arc::new(Mutex::new(None)),
            gate: Arc::new(Notify::new()),
            created: Mutex::new(Vec::new()),
        })
    }

    /// Let upstreams report the registry size when they are closed.
    pub fn observe(&self, manager: &SessionManager) {
        *self.observer.lock() = Some(manager.clone());
    }

    /// Let one gated connect complete.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn created(&self) -> usize {
        self.created.lock().len()
    }

    pub fn upstream(&self, index: usize) -> Option<Arc<MockUpstream>> {
        self.created.lock().get(index).cloned()
    }
}

impl RealtimeFactory for MockUpstreamFactory {
    fn create(&self, config: RealtimeConfig) -> RealtimeResult<SharedRealtime> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let upstream = Arc::new(MockUpstream {
            log: self.log.clone(),
            behavior: self.behavior,
            observer: self.observer.clone(),
            gate: self.gate.clone(),
            config,
            events_tx,
            events: tokio::sync::Mutex::new(events_rx),
            closed: CancellationToken::new(),
            ended: CancellationToken::new(),
        });
        self.created.lock().push(upstream.clone());
        Ok(upstream as SharedRealtime)
    }
}

pub struct RecordingAudio {
    log: CallLog,
    stop: CancellationToken,
    fail_cleanup: bool,
    cleanups: AtomicUsize,
}

impl RecordingAudio {
    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioIo for RecordingAudio {
    async fn next_chunk(&self) -> Option<Bytes> {
        self.stop.cancelled().await;
        None
    }

    fn stop_streaming(&self) {
        self.log.push("audio.stop_streaming");
        self.stop.cancel();
    }

    async fn play_audio(&self, audio: RealtimeAudioData) -> Result<(), AudioError> {
        self.log.push(format!("audio.play:{}", audio.data.len()));
        Ok(())
    }

    fn stop_playback_immediately(&self) {
        self.log.push("audio.interrupt");
    }

    fn cleanup(&self) -> Result<(), AudioError> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        self.log.push("audio.cleanup");
        if self.fail_cleanup {
            return Err(AudioError::Device("speaker unplugged".to_string()));
        }
        Ok(())
    }
}

pub struct RecordingAudioFactory {
    log: CallLog,
    fail_cleanup: bool,
    handlers: Mutex<Vec<Arc<RecordingAudio>>>,
}

impl RecordingAudioFactory {
    pub fn new(log: CallLog) -> Arc<Self> {
        Self::build(log, false)
    }

    pub fn failing_cleanup(log: CallLog) -> Arc<Self> {
        Self::build(log, true)
    }

    fn build(log: CallLog, fail_cleanup: bool) -> Arc<Self> {
        Arc::new(Self {
            log,
            fail_cleanup,
            handlers: Mutex::new(Vec::new()),
        })
    }

    pub fn handler(&self, index: usize) -> Option<Arc<RecordingAudio>> {
        self.handlers.lock().get(index).cloned()
    }
}

impl AudioIoFactory for RecordingAudioFactory {
    fn create(
        &self,
        _client_id: &str,
        _routes: mpsc::Sender<SessionRoute>,
    ) -> Result<SharedAudio, AudioError> {
        let handler = Arc::new(RecordingAudio {
            log: self.log.clone(),
            stop: CancellationToken::new(),
            fail_cleanup: self.fail_cleanup,
            cleanups: AtomicUsize::new(0),
        });
        self.handlers.lock().push(handler.clone());
        Ok(handler as SharedAudio)
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
