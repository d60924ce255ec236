//! Build Session Library
//!
//! Orchestrates one external compiler build at a time and turns its console
//! output into structured diagnostics:
//! - Temporarily patches the toolchain search path and restores it exactly
//! - Captures interleaved stdout/stderr chunks for the duration of a build
//! - Defers finalization so trailing stderr still lands in the transcript
//! - Parses gcc/clang or rustc diagnostics from the combined output
//! - Publishes `build_started` / `build_completed` notifications
//!
//! # Architecture
//!
//! ```text
//! Invoker ── start ──▶ BuildSession ── patch ──▶ Environment
//!    │                     │  ▲
//!    │ chunks              │  └── deferred finalize (Scheduler)
//!    ▼                     ▼
//! ConsoleBus ──▶ ConsoleCapture ──▶ DiagnosticParser ──▶ EventBus ──▶ Listeners
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use build_session::{spawn_session, BuildRequest, BuildSession, SessionConfig};
//!
//! let (handle, _driver) = spawn_session(BuildSession::builder(SessionConfig::from_env()?));
//! let mut events = handle.subscribe_events();
//!
//! let outcome = handle.start(BuildRequest::new("src/x.cpp")).await?;
//! handle.console().write_error("src/x.cpp:3:1: error: bad\n");
//! handle.build_complete(false, "")?;
//!
//! let completed = events.completion_of(outcome.build_id().unwrap()).await?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod console;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod events;
pub mod paths;
pub mod session;

pub use config::{ConfigError, ReentryPolicy, SessionConfig};
pub use console::{Channel, ConsoleBus, ConsoleCapture, ConsoleChunk, SharedConsoleBus};
pub use diagnostics::{
    CompileError, DiagnosticParser, DiagnosticSummary, Dialect, GccErrorParser, RustcErrorParser,
    Severity,
};
pub use environment::{
    DirectoryToolchain, EnvPatcher, Environment, MemoryEnvironment, NoToolchain,
    ProcessEnvironment, ToolchainLocator,
};
pub use error::{SessionError, SessionResult};
pub use events::{
    BuildEvent, BuildId, BuildOutput, BuildResult, EventBus, EventReceiver, Notification,
    OutputKind, SharedEventBus,
};
pub use session::{
    spawn_session, BuildRequest, BuildSession, BuildSessionBuilder, ManualScheduler,
    Scheduler, SessionDriver, SessionHandle, SessionState, SessionStatus, StartOutcome,
};
