//! Event types published when a build starts and completes
//!
//! `BuildResult` is the payload downstream consumers parse, so its field
//! names are part of the wire contract (camelCase keys, lowercase kinds).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnostics::CompileError;

/// Unique identifier for notifications
pub type EventId = String;

/// Monotonic id of one accepted `start`
pub type BuildId = u64;

/// Console channel an output entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Standard output
    Normal,
    /// Standard error
    Error,
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputKind::Normal => write!(f, "normal"),
            OutputKind::Error => write!(f, "error"),
        }
    }
}

/// One block of build output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutput {
    pub kind: OutputKind,
    pub text: String,
}

impl BuildOutput {
    pub fn normal(text: impl Into<String>) -> Self {
        Self {
            kind: OutputKind::Normal,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: OutputKind::Error,
            text: text.into(),
        }
    }
}

/// Payload of the `completed` notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    /// Target of the build, with the home directory aliased to `~`
    pub target_file: String,
    /// Output blocks in the order they should be shown
    pub outputs: Vec<BuildOutput>,
    /// Parsed diagnostics, in input order
    pub errors: Vec<CompileError>,
}

impl BuildResult {
    /// Concatenated text of all outputs of one kind
    pub fn text_of(&self, kind: OutputKind) -> String {
        self.outputs
            .iter()
            .filter(|o| o.kind == kind)
            .map(|o| o.text.as_str())
            .collect()
    }

    /// Whether any diagnostic has error severity
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| e.severity.is_error())
    }
}

/// Build lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BuildEvent {
    /// A build was accepted and output capture began
    BuildStarted,
    /// A build was finalized
    BuildCompleted(BuildResult),
}

impl BuildEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            BuildEvent::BuildStarted => "build_started",
            BuildEvent::BuildCompleted(_) => "build_completed",
        }
    }

    /// The result carried by a completion event
    pub fn result(&self) -> Option<&BuildResult> {
        match self {
            BuildEvent::BuildStarted => None,
            BuildEvent::BuildCompleted(result) => Some(result),
        }
    }
}

/// Envelope around every published event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: EventId,
    /// Bus-wide publish order
    pub sequence: u64,
    pub build_id: BuildId,
    pub timestamp: DateTime<Utc>,
    pub event: BuildEvent,
}

impl Notification {
    /// Create a new unique event ID
    pub fn new_id() -> EventId {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.event, BuildEvent::BuildCompleted(_))
    }
}
