use std::process::ExitCode;

use anyhow::{Context, Result};
use build_runner::{render_summary, run_build, Args, RunOutcome};
use build_session::{spawn_session, BuildSession};
use clap::Parser;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "build_runner=info,build_session=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.session_config()?;
    let command = args.build_command()?;
    info!(
        target = %args.target.display(),
        command = %command.display(),
        delay_ms = config.completion_delay_ms,
        dialect = %config.dialect,
        "Build runner starting"
    );

    let (handle, driver) = spawn_session(BuildSession::builder(config));
    let mut events = handle.subscribe_events();

    let outcome = run_build(&handle, args.request(), &command).await?;

    if args.events {
        for notification in events.drain() {
            println!(
                "{}",
                serde_json::to_string(&notification).context("encoding notification")?
            );
        }
    }

    let code = match outcome {
        RunOutcome::Busy { active } => {
            eprintln!("session busy with build {active}");
            ExitCode::from(2)
        }
        RunOutcome::Finished(report) => {
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report.result).context("encoding result")?
                );
            } else if !args.events {
                println!("{}", render_summary(&report));
            }
            if report.succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    };

    handle.shutdown();
    driver.await.context("session driver panicked")?;
    Ok(code)
}
