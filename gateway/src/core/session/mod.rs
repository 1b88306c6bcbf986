//! Per-client session lifecycle.

mod error;
mod events;
mod handle;
mod manager;

pub use error::{SessionError, SessionResult};
pub use events::{ClientMessage, ServerEvent, SessionRoute};
pub use handle::{Session, SessionState};
pub use manager::{DEFAULT_CONNECT_TIMEOUT, DispatchOutcome, SessionManager, SessionManagerBuilder};
