//! Build session orchestration
//!
//! [`BuildSession`] is the state machine; [`SessionDriver`] runs it on a
//! Tokio task and [`SessionHandle`] is what build invokers talk to.

pub mod driver;
pub mod scheduler;
pub mod state;

pub use driver::{spawn_session, SessionDriver, SessionHandle};
pub use scheduler::{DeferredTask, LoopScheduler, ManualScheduler, Scheduler};
pub use state::{
    join_reported_lines, BuildRequest, BuildSession, BuildSessionBuilder, SessionState,
    SessionStatus, StartOutcome,
};
