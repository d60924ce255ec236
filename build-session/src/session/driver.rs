//! Tokio driver for a [`BuildSession`]
//!
//! One task owns the session and is its only writer. Console chunks,
//! invoker commands and deferred callbacks all arrive on that task; the
//! select is biased towards console chunks so output delivered before a
//! command is always appended before the command is handled.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::scheduler::{DeferredTask, LoopScheduler};
use super::state::{BuildRequest, BuildSession, BuildSessionBuilder, SessionStatus, StartOutcome};
use crate::console::SharedConsoleBus;
use crate::error::{SessionError, SessionResult};
use crate::events::{EventReceiver, SharedEventBus};

enum Command {
    Start {
        request: BuildRequest,
        reply: oneshot::Sender<SessionResult<StartOutcome>>,
    },
    BuildComplete {
        succeeded: bool,
        output: String,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Shutdown,
}

/// Cloneable handle used by build invokers
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    console: SharedConsoleBus,
    events: SharedEventBus,
}

impl SessionHandle {
    /// Ask to start a build; see [`BuildSession::start`]
    pub async fn start(&self, request: BuildRequest) -> SessionResult<StartOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { request, reply })?;
        rx.await.map_err(|_| SessionError::DriverClosed)?
    }

    /// Report that the build tool exited. Returns immediately.
    pub fn build_complete(&self, succeeded: bool, output: impl Into<String>) -> SessionResult<()> {
        self.send(Command::BuildComplete {
            succeeded,
            output: output.into(),
        })
    }

    /// Discard any in-flight build
    pub async fn reset(&self) -> SessionResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset { reply })?;
        rx.await.map_err(|_| SessionError::DriverClosed)
    }

    pub async fn status(&self) -> SessionResult<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply })?;
        rx.await.map_err(|_| SessionError::DriverClosed)
    }

    /// Stop the driver; an in-flight build is discarded
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Stream the build tool's output is published on
    pub fn console(&self) -> &SharedConsoleBus {
        &self.console
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    pub fn subscribe_events(&self) -> EventReceiver {
        self.events.subscribe()
    }

    fn send(&self, command: Command) -> SessionResult<()> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::DriverClosed)
    }
}

/// Event loop owning one [`BuildSession`]
pub struct SessionDriver {
    session: BuildSession,
    commands: mpsc::UnboundedReceiver<Command>,
    deferred: mpsc::UnboundedReceiver<DeferredTask>,
}

impl SessionDriver {
    pub fn new(builder: BuildSessionBuilder) -> (Self, SessionHandle) {
        let (scheduler, deferred) = LoopScheduler::channel();
        let session = builder.build(scheduler);
        let (commands_tx, commands) = mpsc::unbounded_channel();

        let handle = SessionHandle {
            commands: commands_tx,
            console: session.console().clone(),
            events: session.notifier().clone(),
        };
        let driver = Self {
            session,
            commands,
            deferred,
        };
        (driver, handle)
    }

    /// Run until shut down or every handle is dropped
    pub async fn run(mut self) {
        debug!("Session driver running");
        loop {
            tokio::select! {
                biased;

                Some(chunk) = self.session.next_console_chunk() => {
                    self.session.on_output_chunk(chunk);
                }
                Some(task) = self.deferred.recv() => {
                    task(&mut self.session);
                }
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle(command) {
                        break;
                    }
                }
            }
        }
        self.session.reset();
        info!("Session driver stopped");
    }

    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start { request, reply } => {
                let _ = reply.send(self.session.start(request));
            }
            Command::BuildComplete { succeeded, output } => {
                self.session.on_build_complete(succeeded, output);
            }
            Command::Reset { reply } => {
                self.session.reset();
                let _ = reply.send(());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.session.status());
            }
            Command::Shutdown => return false,
        }
        true
    }
}

/// Spawn a driver on the current runtime
pub fn spawn_session(builder: BuildSessionBuilder) -> (SessionHandle, JoinHandle<()>) {
    let (driver, handle) = SessionDriver::new(builder);
    let join = tokio::spawn(driver.run());
    (handle, join)
}
