//! Build notifications
//!
//! Two events reach external listeners: `build_started` when a build is
//! accepted and `build_completed` carrying the [`BuildResult`] payload.
//! Each is wrapped in a [`Notification`] envelope whose `sequence` orders
//! events across the bus, so a listener can check that a build's start
//! precedes its completion.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ BuildSession │────▶│  Event Bus   │────▶│  Listeners   │
//! │  (publish)   │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventBusError, EventBusResult, EventReceiver, SharedEventBus};
pub use types::{
    BuildEvent, BuildId, BuildOutput, BuildResult, EventId, Notification, OutputKind,
};
