//! Build session state machine
//!
//! ```text
//!          start                on_build_complete          finalize
//!   Idle ─────────▶ Building ───────────────────▶ Pending ───────────▶ Idle
//!     ▲                │ watchdog                                        │
//!     └────────────────┴─────────────────────────────────────────────────┘
//! ```
//!
//! Every return to `Idle` restores the environment patch (if any), drops
//! the console subscription and clears the per-build buffers.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::scheduler::Scheduler;
use crate::config::{ReentryPolicy, SessionConfig};
use crate::console::{normalize_newline, ConsoleBus, ConsoleCapture, ConsoleChunk, SharedConsoleBus};
use crate::diagnostics::DiagnosticParser;
use crate::environment::{
    EnvPatcher, ProcessEnvironment, SavedVar, SharedEnvironment, ToolchainLocator,
};
use crate::error::SessionResult;
use crate::events::{BuildId, BuildOutput, BuildResult, EventBus, SharedEventBus};
use crate::paths::{alias_path, base_directory};

/// What the invoker asks to build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub target_file: PathBuf,
    /// Built from an in-memory code string; diagnostics are not parsed
    pub from_code: bool,
    /// Report the full console transcript even on success
    pub show_output: bool,
}

impl BuildRequest {
    pub fn new(target_file: impl Into<PathBuf>) -> Self {
        Self {
            target_file: target_file.into(),
            from_code: false,
            show_output: false,
        }
    }

    pub fn from_code(mut self, from_code: bool) -> Self {
        self.from_code = from_code;
        self
    }

    pub fn show_output(mut self, show_output: bool) -> Self {
        self.show_output = show_output;
        self
    }
}

/// Answer to `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// The invoker may build
    Accepted(BuildId),
    /// Another build is in flight and the policy is `reject`
    Busy { active: BuildId },
}

impl StartOutcome {
    /// Whether the invoker is authorized to run the build
    pub fn is_authorized(&self) -> bool {
        matches!(self, StartOutcome::Accepted(_))
    }

    pub fn build_id(&self) -> Option<BuildId> {
        match self {
            StartOutcome::Accepted(id) => Some(*id),
            StartOutcome::Busy { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Building,
    CompletionPending,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Building => write!(f, "building"),
            SessionState::CompletionPending => write!(f, "completion_pending"),
        }
    }
}

/// Snapshot for status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub build_id: Option<BuildId>,
    pub target_file: Option<PathBuf>,
}

/// Join the tool's output lines the way invokers report them
pub fn join_reported_lines<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|l| l.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-build fields; present exactly while not idle
struct ActiveBuild {
    id: BuildId,
    request: BuildRequest,
    saved_env: Option<SavedVar>,
    toolchain_warning: Option<String>,
}

/// Tracks one build at a time from `start` to finalize
pub struct BuildSession {
    config: SessionConfig,
    patcher: EnvPatcher,
    capture: ConsoleCapture,
    parser: Box<dyn DiagnosticParser>,
    notifier: SharedEventBus,
    scheduler: Box<dyn Scheduler>,
    state: SessionState,
    active: Option<ActiveBuild>,
    last_build_id: BuildId,
}

impl BuildSession {
    pub fn builder(config: SessionConfig) -> BuildSessionBuilder {
        BuildSessionBuilder::new(config)
    }

    /// Begin a build: patch the environment, start capturing console
    /// output and announce `started`.
    ///
    /// A subscription failure aborts the start and leaves the session idle
    /// with the environment restored.
    pub fn start(&mut self, request: BuildRequest) -> SessionResult<StartOutcome> {
        if let Some(active) = &self.active {
            match self.config.reentry {
                ReentryPolicy::Reject => {
                    info!(active = active.id, "Build rejected: another build is in flight");
                    return Ok(StartOutcome::Busy { active: active.id });
                }
                ReentryPolicy::Replace => {
                    warn!(previous = active.id, "Discarding in-flight build for a new start");
                }
            }
        }
        self.reset();

        self.last_build_id += 1;
        let build_id = self.last_build_id;

        let patch = self.patcher.apply();
        if let Err(e) = self.capture.subscribe() {
            if let Some(saved) = patch.saved {
                self.patcher.restore(saved);
            }
            warn!(build_id, "Build not started: {}", e);
            return Err(e.into());
        }

        info!(
            build_id,
            target = %request.target_file.display(),
            from_code = request.from_code,
            show_output = request.show_output,
            patched = patch.patched,
            "Build started"
        );
        self.active = Some(ActiveBuild {
            id: build_id,
            request,
            saved_env: patch.saved,
            toolchain_warning: patch.warning,
        });
        self.state = SessionState::Building;
        self.notifier.started(build_id);

        if let Some(timeout) = self.config.watchdog_timeout() {
            self.scheduler
                .schedule(timeout, Box::new(move |session: &mut BuildSession| {
                    session.on_watchdog(build_id);
                }));
        }

        Ok(StartOutcome::Accepted(build_id))
    }

    /// Append a console chunk to the current build's buffers
    pub fn on_output_chunk(&mut self, chunk: ConsoleChunk) -> bool {
        self.capture.append(chunk)
    }

    /// Append every chunk already queued on the console stream.
    ///
    /// Hosts that drive the session without [`SessionDriver`] must call
    /// this regularly while a build runs: the console stream holds a
    /// bounded number of chunks ([`CHANNEL_CAPACITY`] by default) and older
    /// ones are dropped, with a warning, once it overflows.
    ///
    /// [`SessionDriver`]: super::SessionDriver
    /// [`CHANNEL_CAPACITY`]: crate::console::bus::CHANNEL_CAPACITY
    pub fn drain_console(&mut self) -> usize {
        self.capture.drain()
    }

    /// Wait for the next console chunk of the current build
    pub async fn next_console_chunk(&mut self) -> Option<ConsoleChunk> {
        self.capture.next_chunk().await
    }

    /// The build tool exited. Finalize is deferred by the completion delay
    /// so trailing output can still arrive.
    pub fn on_build_complete(&mut self, succeeded: bool, reported_output: String) -> bool {
        let Some(active) = &self.active else {
            warn!("Build completion reported with no build in flight");
            return false;
        };
        if self.state != SessionState::Building {
            warn!(build_id = active.id, "Duplicate build completion ignored");
            return false;
        }

        let build_id = active.id;
        let delay = self.config.completion_delay();
        self.state = SessionState::CompletionPending;
        debug!(
            build_id,
            succeeded,
            delay_ms = delay.as_millis() as u64,
            "Build complete; finalize deferred"
        );
        self.scheduler.schedule(
            delay,
            Box::new(move |session: &mut BuildSession| {
                session.finalize(build_id, succeeded, reported_output);
            }),
        );
        true
    }

    /// Publish the result of `build_id` and return to idle. A no-op for a
    /// build that is no longer current.
    pub fn finalize(
        &mut self,
        build_id: BuildId,
        succeeded: bool,
        reported_output: String,
    ) -> Option<BuildResult> {
        if self.state != SessionState::CompletionPending || self.current_build() != Some(build_id) {
            debug!(build_id, "Stale finalize ignored");
            return None;
        }
        let active = self.active.take()?;
        Some(self.finish(active, succeeded, reported_output, None))
    }

    /// Watchdog expiry: a build that never reported completion is
    /// finalized as failed.
    pub fn on_watchdog(&mut self, build_id: BuildId) -> Option<BuildResult> {
        if self.state != SessionState::Building || self.current_build() != Some(build_id) {
            return None;
        }
        let timeout = self.config.watchdog_timeout_secs;
        warn!(build_id, timeout_secs = timeout, "Build never reported completion");
        let active = self.active.take()?;
        let note = format!("build did not report completion within {timeout}s");
        Some(self.finish(active, false, String::new(), Some(note)))
    }

    fn finish(
        &mut self,
        active: ActiveBuild,
        succeeded: bool,
        reported_output: String,
        note: Option<String>,
    ) -> BuildResult {
        self.capture.drain();
        if let Some(saved) = active.saved_env {
            self.patcher.restore(saved);
        }
        self.capture.unsubscribe();
        let (stdout, stderr) = self.capture.take_buffers();

        let request = active.request;
        let selected = if !succeeded || request.show_output {
            stdout
        } else {
            reported_output
        };

        let errors = if request.from_code {
            Vec::new()
        } else {
            let combined = format!("{selected}\n{stderr}");
            self.parser
                .parse(&combined, base_directory(&request.target_file))
        };

        let mut outputs = vec![BuildOutput::normal(selected), BuildOutput::error(stderr)];
        if let Some(note) = note {
            outputs.push(BuildOutput::error(normalize_newline(note)));
        }
        if !succeeded {
            if let Some(warning) = active.toolchain_warning {
                let warning = normalize_newline(warning);
                self.capture.bus().write_error(warning.clone());
                outputs.push(BuildOutput::error(warning));
            }
        }

        let result = BuildResult {
            target_file: alias_path(&request.target_file, self.config.home_dir.as_deref()),
            outputs,
            errors,
        };
        info!(
            build_id = active.id,
            succeeded,
            diagnostics = result.errors.len(),
            "Build finalized"
        );
        self.notifier.completed(active.id, result.clone());

        self.reset();
        result
    }

    /// Drop all per-build state. Restores an active environment patch.
    /// Safe to call at any time, any number of times.
    pub fn reset(&mut self) {
        if let Some(active) = self.active.take() {
            if let Some(saved) = active.saved_env {
                self.patcher.restore(saved);
            }
            debug!(build_id = active.id, "Build state discarded");
        }
        self.capture.reset();
        self.state = SessionState::Idle;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    pub fn current_build(&self) -> Option<BuildId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            build_id: self.current_build(),
            target_file: self.active.as_ref().map(|a| a.request.target_file.clone()),
        }
    }

    /// Warning recorded while patching the environment for this build
    pub fn toolchain_warning(&self) -> Option<&str> {
        self.active.as_ref()?.toolchain_warning.as_deref()
    }

    pub fn captured_stdout(&self) -> &str {
        self.capture.stdout()
    }

    pub fn captured_stderr(&self) -> &str {
        self.capture.stderr()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn console(&self) -> &SharedConsoleBus {
        self.capture.bus()
    }

    pub fn notifier(&self) -> &SharedEventBus {
        &self.notifier
    }
}

impl Drop for BuildSession {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Assembles a [`BuildSession`]; unset collaborators get process defaults
pub struct BuildSessionBuilder {
    config: SessionConfig,
    environment: Option<SharedEnvironment>,
    locator: Option<Box<dyn ToolchainLocator>>,
    console: Option<SharedConsoleBus>,
    notifier: Option<SharedEventBus>,
    parser: Option<Box<dyn DiagnosticParser>>,
}

impl BuildSessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            environment: None,
            locator: None,
            console: None,
            notifier: None,
            parser: None,
        }
    }

    pub fn environment(mut self, environment: SharedEnvironment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn toolchain(mut self, locator: impl ToolchainLocator + 'static) -> Self {
        self.locator = Some(Box::new(locator));
        self
    }

    pub fn console(mut self, console: SharedConsoleBus) -> Self {
        self.console = Some(console);
        self
    }

    pub fn notifier(mut self, notifier: SharedEventBus) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn parser(mut self, parser: impl DiagnosticParser + 'static) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn build(self, scheduler: impl Scheduler + 'static) -> BuildSession {
        let config = self.config;
        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(ProcessEnvironment));
        let locator = self
            .locator
            .unwrap_or_else(|| Box::new(config.toolchain.clone()));
        let console = self.console.unwrap_or_else(|| ConsoleBus::new().shared());
        let notifier = self.notifier.unwrap_or_else(|| EventBus::new().shared());
        let parser = self.parser.unwrap_or_else(|| config.dialect.parser());

        BuildSession {
            patcher: EnvPatcher::new(environment, locator, config.path_variable.clone()),
            capture: ConsoleCapture::new(console, config.normalize_newlines),
            parser,
            notifier,
            scheduler: Box::new(scheduler),
            state: SessionState::Idle,
            active: None,
            last_build_id: 0,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ConsoleBus;
    use crate::diagnostics::Severity;
    use crate::environment::{DirectoryToolchain, Environment, MemoryEnvironment, NoToolchain};
    use crate::events::{BuildEvent, EventReceiver, OutputKind};
    use crate::session::ManualScheduler;
    use std::ffi::OsString;
    use std::time::Duration;

    const DELAY: Duration = Duration::from_millis(200);

    struct Fixture {
        session: BuildSession,
        scheduler: ManualScheduler,
        env: Arc<MemoryEnvironment>,
        bus: SharedConsoleBus,
        events: EventReceiver,
    }

    impl Fixture {
        fn new(config: SessionConfig) -> Self {
            Self::with_toolchain(config, NoToolchain)
        }

        fn with_toolchain(config: SessionConfig, locator: impl ToolchainLocator + 'static) -> Self {
            let env = MemoryEnvironment::new().with_var("PATH", "/usr/bin").shared();
            let bus = ConsoleBus::new().shared();
            let notifier = EventBus::new().shared();
            let events = notifier.subscribe();
            let scheduler = ManualScheduler::new();
            let session = BuildSession::builder(config)
                .environment(env.clone())
                .toolchain(locator)
                .console(bus.clone())
                .notifier(notifier)
                .build(scheduler.clone());
            Self {
                session,
                scheduler,
                env,
                bus,
                events,
            }
        }

        fn advance(&mut self, by: Duration) -> usize {
            self.scheduler.advance(by, &mut self.session)
        }

        fn completed(&mut self) -> Vec<(BuildId, BuildResult)> {
            self.events
                .drain()
                .into_iter()
                .filter_map(|n| match n.event {
                    BuildEvent::BuildCompleted(result) => Some((n.build_id, result)),
                    BuildEvent::BuildStarted => None,
                })
                .collect()
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            home_dir: Some(PathBuf::from("/home/dev")),
            normalize_newlines: false,
            watchdog_timeout_secs: 0,
            ..SessionConfig::default()
        }
    }

    fn accepted(outcome: SessionResult<StartOutcome>) -> BuildId {
        outcome.unwrap().build_id().expect("start was not accepted")
    }

    #[test]
    fn test_successful_build_reports_invoker_output() {
        let mut fx = Fixture::new(config());
        accepted(fx.session.start(BuildRequest::new("/home/dev/src/x.cpp")));
        assert_eq!(fx.session.state(), SessionState::Building);

        fx.bus.write_normal("compiling\n");
        assert!(fx.session.on_build_complete(true, "done".to_string()));
        assert_eq!(fx.session.state(), SessionState::CompletionPending);

        fx.advance(DELAY);
        let completed = fx.completed();
        assert_eq!(completed.len(), 1);
        let result = &completed[0].1;
        assert_eq!(result.target_file, "~/src/x.cpp");
        assert_eq!(result.outputs[0], BuildOutput::normal("done"));
        assert_eq!(result.outputs[1], BuildOutput::error(""));
        assert!(result.errors.is_empty());
        assert!(fx.session.is_idle());
    }

    #[test]
    fn test_show_output_reports_transcript() {
        let mut fx = Fixture::new(config());
        accepted(fx.session.start(BuildRequest::new("/tmp/x.cpp").show_output(true)));

        fx.bus.write_normal("compiling\n");
        fx.session.on_build_complete(true, "done".to_string());
        fx.advance(DELAY);

        let (_, result) = fx.completed().remove(0);
        assert_eq!(result.text_of(OutputKind::Normal), "compiling\n");
    }

    #[test]
    fn test_failed_build_parses_stderr() {
        let mut fx = Fixture::new(config());
        accepted(fx.session.start(BuildRequest::new("/proj/x.cpp")));

        fx.bus.write_normal("compiling\n");
        fx.bus.write_error("x.cpp:3:1: error: bad\n");
        fx.session.on_build_complete(false, String::new());
        fx.advance(DELAY);

        let (_, result) = fx.completed().remove(0);
        assert_eq!(result.errors.len(), 1);
        let error = &result.errors[0];
        assert_eq!(PathBuf::from(&error.source_file), PathBuf::from("/proj/x.cpp"));
        assert_eq!(error.line, 3);
        assert_eq!(error.column, 1);
        assert_eq!(error.severity, Severity::Error);
        assert_eq!(error.message, "bad");
        assert_eq!(result.text_of(OutputKind::Normal), "compiling\n");
        assert!(result.text_of(OutputKind::Error).contains("error: bad"));
    }

    #[test]
    fn test_finalize_waits_for_completion_delay() {
        let mut fx = Fixture::new(config());
        accepted(fx.session.start(BuildRequest::new("/proj/x.cpp")));
        fx.session.on_build_complete(false, String::new());

        fx.advance(Duration::from_millis(150));
        assert!(fx.completed().is_empty());

        // Trailing stderr after the process exited still counts
        fx.bus.write_error("x.cpp:9:2: error: late\n");
        fx.advance(Duration::from_millis(50));

        let (_, result) = fx.completed().remove(0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].line, 9);
    }

    #[test]
    fn test_from_code_skips_parsing() {
        let mut fx = Fixture::new(config());
        accepted(fx.session.start(BuildRequest::new("/proj/x.cpp").from_code(true)));
        fx.bus.write_error("x.cpp:3:1: error: bad\n");
        fx.session.on_build_complete(false, String::new());
        fx.advance(DELAY);

        let (_, result) = fx.completed().remove(0);
        assert!(result.errors.is_empty());
        assert!(result.text_of(OutputKind::Error).contains("error: bad"));
    }

    #[test]
    fn test_started_precedes_completed() {
        let mut fx = Fixture::new(config());
        let id = accepted(fx.session.start(BuildRequest::new("/proj/x.cpp")));
        fx.session.on_build_complete(true, String::new());
        fx.advance(DELAY);

        let notifications = fx.events.drain();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].event_type(), "build_started");
        assert!(notifications[1].is_completed());
        assert!(notifications[0].sequence < notifications[1].sequence);
        assert!(notifications.iter().all(|n| n.build_id == id));
    }

    #[test]
    fn test_replacing_build_does_not_leak_output() {
        let mut fx = Fixture::new(config());
        let first = accepted(fx.session.start(BuildRequest::new("/proj/a.cpp")));
        fx.bus.write_normal("from a\n");
        fx.session.drain_console();
        fx.session.on_build_complete(false, String::new());

        let second = accepted(fx.session.start(BuildRequest::new("/proj/b.cpp")));
        assert_ne!(first, second);
        assert_eq!(fx.session.captured_stdout(), "");

        fx.bus.write_normal("from b\n");
        fx.session.on_build_complete(false, String::new());
        fx.advance(DELAY);

        // The first build's finalize fired but was stale
        let completed = fx.completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].0, second);
        assert_eq!(completed[0].1.text_of(OutputKind::Normal), "from b\n");
    }

    #[test]
    fn test_reject_policy_reports_busy() {
        let mut fx = Fixture::new(SessionConfig {
            reentry: ReentryPolicy::Reject,
            ..config()
        });
        let first = accepted(fx.session.start(BuildRequest::new("/proj/a.cpp")));

        let outcome = fx.session.start(BuildRequest::new("/proj/b.cpp")).unwrap();
        assert_eq!(outcome, StartOutcome::Busy { active: first });
        assert!(!outcome.is_authorized());
        assert_eq!(fx.session.current_build(), Some(first));
    }

    #[test]
    fn test_duplicate_completion_ignored() {
        let mut fx = Fixture::new(config());
        assert!(!fx.session.on_build_complete(true, String::new()));

        accepted(fx.session.start(BuildRequest::new("/proj/x.cpp")));
        assert!(fx.session.on_build_complete(true, String::new()));
        assert!(!fx.session.on_build_complete(false, String::new()));
        fx.advance(DELAY);
        assert_eq!(fx.completed().len(), 1);
    }

    #[test]
    fn test_reset_discards_build_and_is_idempotent() {
        let mut fx = Fixture::new(config());
        accepted(fx.session.start(BuildRequest::new("/proj/x.cpp")));
        fx.bus.write_normal("partial\n");
        fx.session.on_build_complete(true, String::new());

        fx.session.reset();
        fx.session.reset();
        assert!(fx.session.is_idle());
        assert_eq!(fx.session.status().build_id, None);
        assert_eq!(fx.session.captured_stdout(), "");

        fx.advance(DELAY);
        assert!(fx.completed().is_empty());
    }

    #[test]
    fn test_environment_patched_and_restored() {
        let toolchain_dir = tempfile::tempdir().unwrap();
        let mut fx = Fixture::with_toolchain(
            config(),
            DirectoryToolchain::new("gcc", vec![toolchain_dir.path().to_path_buf()]),
        );
        let before = fx.env.var("PATH");

        accepted(fx.session.start(BuildRequest::new("/proj/x.cpp")));
        let during = fx.env.var("PATH").unwrap();
        let first_entry = std::env::split_paths(&during).next().unwrap();
        assert_eq!(first_entry, toolchain_dir.path());

        fx.session.on_build_complete(true, String::new());
        fx.advance(DELAY);
        assert_eq!(fx.env.var("PATH"), before);
    }

    #[test]
    fn test_replace_restores_discarded_patch() {
        let toolchain_dir = tempfile::tempdir().unwrap();
        let mut fx = Fixture::with_toolchain(
            config(),
            DirectoryToolchain::new("gcc", vec![toolchain_dir.path().to_path_buf()]),
        );
        let before = fx.env.var("PATH");

        accepted(fx.session.start(BuildRequest::new("/proj/a.cpp")));
        accepted(fx.session.start(BuildRequest::new("/proj/b.cpp")));
        fx.session.reset();

        // Patched once per build, restored once per build
        assert_eq!(fx.env.var("PATH"), before);
    }

    #[test]
    fn test_missing_toolchain_warns_only_on_failure() {
        let missing = DirectoryToolchain::new("gcc", vec![PathBuf::from("/nonexistent/gcc/bin")]);
        let mut fx = Fixture::with_toolchain(config(), missing);

        accepted(fx.session.start(BuildRequest::new("/proj/x.cpp")));
        assert!(fx.session.toolchain_warning().is_some());
        assert_eq!(fx.env.var("PATH"), Some(OsString::from("/usr/bin")));
        fx.session.on_build_complete(true, String::new());
        fx.advance(DELAY);
        let (_, ok) = fx.completed().remove(0);
        assert_eq!(ok.outputs.len(), 2);

        accepted(fx.session.start(BuildRequest::new("/proj/x.cpp")));
        fx.session.on_build_complete(false, String::new());
        fx.advance(DELAY);
        let (_, failed) = fx.completed().remove(0);
        assert_eq!(failed.outputs.len(), 3);
        assert_eq!(failed.outputs[2].kind, OutputKind::Error);
        assert!(failed.outputs[2].text.contains("could not locate the gcc toolchain"));
        assert!(failed.outputs[2].text.ends_with('\n'));
    }

    #[test]
    fn test_watchdog_finalizes_stuck_build() {
        let mut fx = Fixture::new(SessionConfig {
            watchdog_timeout_secs: 5,
            ..config()
        });
        let id = accepted(fx.session.start(BuildRequest::new("/proj/x.cpp")));
        fx.bus.write_error("x.cpp:1:1: error: stuck\n");

        fx.advance(Duration::from_secs(4));
        assert_eq!(fx.session.state(), SessionState::Building);
        fx.advance(Duration::from_secs(1));

        let completed = fx.completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].0, id);
        let result = &completed[0].1;
        assert_eq!(result.errors.len(), 1);
        assert!(result
            .outputs
            .iter()
            .any(|o| o.text.contains("did not report completion within 5s")));
        assert!(fx.session.is_idle());
    }

    #[test]
    fn test_watchdog_ignores_completed_build() {
        let mut fx = Fixture::new(SessionConfig {
            watchdog_timeout_secs: 5,
            ..config()
        });
        accepted(fx.session.start(BuildRequest::new("/proj/x.cpp")));
        fx.session.on_build_complete(true, String::new());
        fx.advance(Duration::from_secs(10));
        assert_eq!(fx.completed().len(), 1);
    }

    #[test]
    fn test_maximal_watchdog_timeout_never_fires() {
        let mut fx = Fixture::new(SessionConfig {
            watchdog_timeout_secs: u64::MAX,
            ..config()
        });
        fx.advance(Duration::from_secs(1));
        accepted(fx.session.start(BuildRequest::new("/proj/x.cpp")));

        fx.advance(Duration::from_secs(86_400));
        assert_eq!(fx.session.state(), SessionState::Building);
        fx.session.on_build_complete(true, String::new());
        fx.advance(DELAY);
        assert_eq!(fx.completed().len(), 1);
    }

    #[test]
    fn test_closed_console_aborts_start() {
        let toolchain_dir = tempfile::tempdir().unwrap();
        let mut fx = Fixture::with_toolchain(
            config(),
            DirectoryToolchain::new("gcc", vec![toolchain_dir.path().to_path_buf()]),
        );
        let before = fx.env.var("PATH");
        fx.bus.close();

        assert!(fx.session.start(BuildRequest::new("/proj/x.cpp")).is_err());
        assert!(fx.session.is_idle());
        assert_eq!(fx.env.var("PATH"), before);
        assert!(fx.events.drain().is_empty());
    }

    #[test]
    fn test_regular_draining_keeps_small_console_lossless() {
        let bus = ConsoleBus::with_capacity(2).shared();
        let scheduler = ManualScheduler::new();
        let notifier = EventBus::new().shared();
        let mut events = notifier.subscribe();
        let mut session = BuildSession::builder(config())
            .environment(MemoryEnvironment::new().shared())
            .toolchain(NoToolchain)
            .console(bus.clone())
            .notifier(notifier)
            .build(scheduler.clone());

        accepted(session.start(BuildRequest::new("/proj/x.cpp").show_output(true)));
        for pair in [["1\n", "2\n"], ["3\n", "4\n"], ["5\n", "6\n"]] {
            bus.write_normal(pair[0]);
            bus.write_normal(pair[1]);
            assert_eq!(session.drain_console(), 2);
        }
        session.on_build_complete(true, String::new());
        scheduler.advance(DELAY, &mut session);

        let completed = events
            .drain()
            .into_iter()
            .find(|n| n.is_completed())
            .unwrap();
        let result = completed.event.result().unwrap();
        assert_eq!(result.text_of(OutputKind::Normal), "1\n2\n3\n4\n5\n6\n");
    }

    #[test]
    fn test_newline_normalization() {
        let mut fx = Fixture::new(SessionConfig {
            normalize_newlines: true,
            ..config()
        });
        accepted(fx.session.start(BuildRequest::new("/proj/x.cpp").show_output(true)));
        fx.bus.write_normal("a");
        fx.bus.write_normal("b\n");
        fx.session.drain_console();
        assert_eq!(fx.session.captured_stdout(), "a\nb\n");
    }

    #[test]
    fn test_join_reported_lines() {
        assert_eq!(join_reported_lines(["a", "b"]), "a\nb");
        assert_eq!(join_reported_lines(Vec::<String>::new()), "");
    }
}
