//! stratus-supervisor - runs one invocation event inside a function sandbox
//!
//! Reads the event from a file argument or stdin, writes the script's output
//! to stdout. On failure prints an error document and exits non-zero.

use bytes::Bytes;
use clap::Parser;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use stratus_sandbox::{SandboxError, SandboxSettings, Supervisor, SupervisorState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "stratus-supervisor")]
#[command(about = "Run a container script inside a function sandbox", long_about = None)]
struct Args {
    /// Event file; stdin when omitted
    event: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "STRATUS_LOG_LEVEL")]
    log_level: String,
}

fn read_event(path: Option<&Path>) -> Result<Vec<u8>, SandboxError> {
    match path {
        Some(path) => std::fs::read(path).map_err(|e| {
            SandboxError::InvalidEvent(format!("reading event {}: {e}", path.display()))
        }),
        None => {
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .map_err(|e| SandboxError::InvalidEvent(format!("reading event from stdin: {e}")))?;
            Ok(data)
        }
    }
}

fn load_settings() -> Result<&'static SandboxSettings, SandboxError> {
    let settings = SandboxSettings::from_env().map_err(|e| SandboxError::Environment {
        state: SupervisorState::Idle,
        message: format!("loading sandbox settings: {e}"),
    })?;
    Ok(SandboxSettings::install(settings))
}

/// Every failure from here on is reported as an error document
async fn run(event: Option<&Path>) -> Result<Bytes, SandboxError> {
    let settings = load_settings()?;
    let payload = read_event(event)?;
    Supervisor::new(settings.clone()).execute_payload(&payload).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("stratus_sandbox={},stratus_supervisor={}", args.log_level, args.log_level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(args.event.as_deref()).await {
        Ok(output) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&output)?;
            stdout.flush()?;
            Ok(())
        }
        Err(e) => {
            println!("{}", e.to_response().to_json());
            std::process::exit(e.code().exit_code().max(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_event_file_is_invalid_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        let error = read_event(Some(path.as_path())).unwrap_err();
        assert!(matches!(error, SandboxError::InvalidEvent(_)));

        let response = error.to_response();
        assert_eq!(response.error_type, "Sandbox.InvalidEvent");
        assert_eq!(response.state, "Idle");
        assert!(response.error_message.contains("event.json"));
    }

    #[test]
    fn test_event_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, br#"{"image": "alpine"}"#).unwrap();
        assert_eq!(read_event(Some(path.as_path())).unwrap(), br#"{"image": "alpine"}"#);
    }

    #[tokio::test]
    async fn test_unreadable_event_fails_before_supervisor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let error = run(Some(path.as_path())).await.unwrap_err();
        assert_eq!(error.state(), SupervisorState::Idle);
        assert!(matches!(error, SandboxError::InvalidEvent(_)));
    }
}
