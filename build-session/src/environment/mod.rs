//! Environment patching for the toolchain
//!
//! Before a build starts, the toolchain's bin directories are prepended to
//! a search-path variable (usually `PATH`) if they are missing. When the
//! build ends the variable is restored to its exact previous value.

pub mod patcher;
pub mod toolchain;
pub mod vars;

pub use patcher::{EnvPatcher, PatchOutcome, SavedVar};
pub use toolchain::{DirectoryToolchain, NoToolchain, ToolchainLocator, ToolchainMissing};
pub use vars::{Environment, MemoryEnvironment, ProcessEnvironment, SharedEnvironment};
