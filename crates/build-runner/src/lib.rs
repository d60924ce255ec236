//! Build invoker for `build-session`
//!
//! Spawns a compiler, streams its output onto the session console and
//! reports the structured result once the session has finalized the build.

pub mod cli;
pub mod report;
pub mod runner;

pub use cli::Args;
pub use report::render_summary;
pub use runner::{run_build, BuildCommand, BuildReport, RunOutcome};
