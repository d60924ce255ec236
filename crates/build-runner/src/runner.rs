//! Runs one compiler process under a build session.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use build_session::session::join_reported_lines;
use build_session::{BuildId, BuildRequest, BuildResult, SessionHandle, StartOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info, warn};

/// The compiler command line to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl BuildCommand {
    /// First word is the program, the rest are its arguments
    pub fn from_words(words: Vec<String>) -> Option<Self> {
        let mut words = words.into_iter();
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
            working_dir: None,
        })
    }

    /// Split a shell-style command string
    pub fn parse(line: &str) -> Option<Self> {
        Self::from_words(shlex::split(line)?)
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Finished build as seen by the invoker
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub build_id: BuildId,
    pub succeeded: bool,
    /// `None` when the process could not be spawned or was killed by a signal
    pub exit_code: Option<i32>,
    pub result: BuildResult,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Finished(BuildReport),
    /// The session refused the build
    Busy { active: BuildId },
}

struct ProcessExit {
    succeeded: bool,
    exit_code: Option<i32>,
    stdout_lines: Vec<String>,
}

/// Start a build, run `command` with its output on the session console,
/// report completion and wait for the session's `completed` notification.
pub async fn run_build(
    handle: &SessionHandle,
    request: BuildRequest,
    command: &BuildCommand,
) -> Result<RunOutcome> {
    let mut events = handle.subscribe_events();

    let build_id = match handle.start(request).await? {
        StartOutcome::Accepted(id) => id,
        StartOutcome::Busy { active } => return Ok(RunOutcome::Busy { active }),
    };

    let exit = match run_process(handle, command).await {
        Ok(exit) => exit,
        Err(e) => {
            warn!(build_id, command = %command.display(), "Build command failed to run: {:#}", e);
            handle
                .console()
                .write_error(format!("failed to run `{}`: {:#}\n", command.display(), e));
            ProcessExit {
                succeeded: false,
                exit_code: None,
                stdout_lines: Vec::new(),
            }
        }
    };

    handle.build_complete(exit.succeeded, join_reported_lines(&exit.stdout_lines))?;

    let notification = events
        .completion_of(build_id)
        .await
        .context("session stopped before the build completed")?;
    let result = notification
        .event
        .result()
        .cloned()
        .context("completion notification carried no result")?;

    info!(
        build_id,
        succeeded = exit.succeeded,
        diagnostics = result.errors.len(),
        "Build finished"
    );
    Ok(RunOutcome::Finished(BuildReport {
        build_id,
        succeeded: exit.succeeded,
        exit_code: exit.exit_code,
        result,
    }))
}

async fn run_process(handle: &SessionHandle, command: &BuildCommand) -> Result<ProcessExit> {
    let mut child = spawn(command)?;
    let stdout = child.stdout.take().context("stdout was not captured")?;
    let stderr = child.stderr.take().context("stderr was not captured")?;
    let stdout_lines = stream_output(handle, stdout, stderr).await;

    // Output is already on the console; a lost exit status fails the build
    let (succeeded, exit_code) = match child.wait().await {
        Ok(status) => {
            debug!(status = %status, "Build command exited");
            (status.success(), status.code())
        }
        Err(e) => {
            warn!("Lost exit status of build command: {}", e);
            (false, None)
        }
    };
    Ok(ProcessExit {
        succeeded,
        exit_code,
        stdout_lines,
    })
}

fn spawn(command: &BuildCommand) -> Result<Child> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }

    let child = cmd
        .spawn()
        .with_context(|| format!("cannot spawn {}", command.program))?;
    debug!(pid = child.id(), command = %command.display(), "Build command spawned");
    Ok(child)
}

/// Publish both pipes line by line until they close. Returns the stdout
/// lines. A read error ends that pipe only.
async fn stream_output(
    handle: &SessionHandle,
    stdout: ChildStdout,
    stderr: ChildStderr,
) -> Vec<String> {
    let mut stdout = BufReader::new(stdout).split(b'\n');
    let mut stderr = BufReader::new(stderr).split(b'\n');

    let console = handle.console();
    let mut stdout_lines = Vec::new();
    let (mut stdout_open, mut stderr_open) = (true, true);

    while stdout_open || stderr_open {
        tokio::select! {
            segment = stdout.next_segment(), if stdout_open => match segment {
                Ok(Some(bytes)) => {
                    let line = decode_line(bytes);
                    console.write_normal(format!("{line}\n"));
                    stdout_lines.push(line);
                }
                Ok(None) => stdout_open = false,
                Err(e) => {
                    warn!("Reading build stdout failed: {}", e);
                    stdout_open = false;
                }
            },
            segment = stderr.next_segment(), if stderr_open => match segment {
                Ok(Some(bytes)) => {
                    console.write_error(format!("{}\n", decode_line(bytes)));
                }
                Ok(None) => stderr_open = false,
                Err(e) => {
                    warn!("Reading build stderr failed: {}", e);
                    stderr_open = false;
                }
            },
        }
    }
    stdout_lines
}

/// Compilers echo source bytes verbatim, so output need not be UTF-8
fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
