//! Session error types
//!
//! Failures of the build tool itself are never errors here: they travel as
//! data in the `completed` notification. Only faults of the orchestrator
//! (console stream gone, driver stopped, bad config) surface as
//! [`SessionError`].

use thiserror::Error;

use crate::config::ConfigError;
use crate::console::ConsoleBusError;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot capture console output: {0}")]
    Subscribe(#[from] ConsoleBusError),

    #[error("Session driver has stopped")]
    DriverClosed,

    #[error(transparent)]
    Config(#[from] ConfigError),
}
