//! Command-line interface

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use build_session::{BuildRequest, Dialect, SessionConfig};
use clap::Parser;

use crate::runner::BuildCommand;

/// Run a compiler under a build session and report its diagnostics
#[derive(Debug, Parser)]
#[command(name = "build-runner", version, about)]
pub struct Args {
    /// Source file the build is for; relative diagnostics resolve against its directory
    #[arg(long)]
    pub target: PathBuf,

    /// The target was written from an in-memory code string; skip diagnostics
    #[arg(long)]
    pub from_code: bool,

    /// Report the full console transcript even when the build succeeds
    #[arg(long)]
    pub show_output: bool,

    /// Milliseconds to keep capturing output after the command exits
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Finalize as failed when no completion arrives within this many seconds (0 disables)
    #[arg(long)]
    pub watchdog_secs: Option<u64>,

    /// Diagnostic format of the compiler output
    #[arg(long)]
    pub dialect: Option<Dialect>,

    /// TOML session config
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print every notification as a JSON line
    #[arg(long)]
    pub events: bool,

    /// Print the completed result as JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Compiler command as one shell-quoted string
    #[arg(long, conflicts_with = "argv")]
    pub command: Option<String>,

    /// Working directory for the command
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Compiler command and arguments
    #[arg(last = true, value_name = "COMMAND")]
    pub argv: Vec<String>,
}

impl Args {
    /// Config file (if any), then environment, then flags
    pub fn session_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SessionConfig::default(),
        };
        config.apply_env().context("reading BUILD_SESSION_* variables")?;

        if let Some(ms) = self.delay_ms {
            config.completion_delay_ms = ms;
        }
        if let Some(secs) = self.watchdog_secs {
            config.watchdog_timeout_secs = secs;
        }
        if let Some(dialect) = self.dialect {
            config.dialect = dialect;
        }
        Ok(config)
    }

    pub fn request(&self) -> BuildRequest {
        BuildRequest::new(&self.target)
            .from_code(self.from_code)
            .show_output(self.show_output)
    }

    pub fn build_command(&self) -> Result<BuildCommand> {
        let command = match &self.command {
            Some(line) => BuildCommand::parse(line)
                .with_context(|| format!("cannot split command line: {line}"))?,
            None => match BuildCommand::from_words(self.argv.clone()) {
                Some(command) => command,
                None => bail!("no build command given (use --command or `-- COMMAND ...`)"),
            },
        };
        Ok(match &self.cwd {
            Some(dir) => command.working_dir(dir),
            None => command,
        })
    }
}
