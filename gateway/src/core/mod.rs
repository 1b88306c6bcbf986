pub mod audio;
pub mod realtime;
pub mod session;
pub mod tools;

// Re-export commonly used types for convenience
pub use audio::{AudioError, AudioIo, AudioIoFactory, BrowserAudio, BrowserAudioFactory, SharedAudio};

pub use realtime::{
    BaseRealtime, OpenAIRealtime, OpenAIRealtimeFactory, RealtimeConfig, RealtimeError,
    RealtimeEvent, RealtimeFactory, RealtimeResult, SharedRealtime,
};

pub use session::{
    ClientMessage, DispatchOutcome, ServerEvent, Session, SessionError, SessionManager,
    SessionResult, SessionRoute, SessionState,
};

pub use tools::{PhoneDirectory, Tool, ToolError, ToolRegistry};
