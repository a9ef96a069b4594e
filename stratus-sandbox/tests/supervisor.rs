//! Integration tests for the sandbox supervisor
//!
//! The engine and the network are replaced by fakes that record what the
//! supervisor asked for.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use stratus_core::InvocationEvent;
use stratus_sandbox::fetch::FetchError;
use stratus_sandbox::{
    Fetcher, ProcessOutput, ProcessRunner, SandboxError, SandboxSettings, Supervisor,
    SupervisorState,
};

const ENGINE_URL: &str = "https://engine.test/udocker";

/// Serves fixed bodies by URL
#[derive(Default)]
struct FakeFetcher {
    bodies: HashMap<String, Bytes>,
}

impl FakeFetcher {
    fn with_engine() -> Self {
        let mut fetcher = Self::default();
        fetcher
            .bodies
            .insert(ENGINE_URL.to_string(), Bytes::from_static(b"#!/bin/sh\n"));
        fetcher
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn download(&self, url: &Url) -> Result<Bytes, FetchError> {
        self.bodies
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::InvalidReference(url.to_string()))
    }
}

#[derive(Debug, Clone)]
struct Call {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    /// Mode of the engine binary when it was invoked
    mode: u32,
    /// Script file contents, captured on `run`
    script: Option<String>,
}

/// Engine stand-in; optionally fails one subcommand or writes an output file
#[derive(Clone, Default)]
struct FakeEngine {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_on: Option<&'static str>,
    output: Option<&'static str>,
}

impl FakeEngine {
    fn subcommands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.args[0].clone())
            .collect()
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeEngine {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        env: &[(String, String)],
    ) -> std::io::Result<ProcessOutput> {
        use std::os::unix::fs::PermissionsExt;

        let mode = std::fs::metadata(program)?.permissions().mode() & 0o777;
        let script = match args.last() {
            Some(path) if args[0] == "run" => Some(std::fs::read_to_string(path)?),
            _ => None,
        };
        self.calls.lock().unwrap().push(Call {
            program: program.to_path_buf(),
            args: args.to_vec(),
            env: env.to_vec(),
            mode,
            script,
        });

        if self.fail_on == Some(args[0].as_str()) {
            return Ok(ProcessOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: format!("{} failed", args[0]),
            });
        }

        if args[0] == "run" {
            if let Some(content) = self.output {
                let target = args
                    .iter()
                    .find_map(|a| a.strip_prefix("--env=OUTPUT_FILE="))
                    .expect("run passes OUTPUT_FILE");
                std::fs::write(target, content)?;
            }
        }

        Ok(ProcessOutput {
            code: Some(0),
            ..Default::default()
        })
    }
}

fn settings(scratch_root: &Path) -> SandboxSettings {
    SandboxSettings {
        scratch_root: scratch_root.to_path_buf(),
        udocker_url: ENGINE_URL.to_string(),
        container_name: "job".to_string(),
        ..Default::default()
    }
}

fn event() -> InvocationEvent {
    // "echo 42 > $OUTPUT_FILE"
    InvocationEvent::new("alpine:3.19", "base64:ZWNobyA0MiA+ICRPVVRQVVRfRklMRQ==")
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

#[tokio::test]
async fn test_successful_invocation() {
    let root = tempfile::tempdir().unwrap();
    let engine = FakeEngine {
        output: Some("42\n"),
        ..Default::default()
    };
    let mut supervisor =
        Supervisor::with_parts(settings(root.path()), FakeFetcher::with_engine(), engine.clone());

    let output = supervisor.execute(&event()).await.unwrap();

    assert_eq!(&output[..], b"42\n");
    assert_eq!(supervisor.state(), SupervisorState::Completed);
    assert_eq!(
        supervisor.progress(),
        &[
            SupervisorState::Idle,
            SupervisorState::EnvironmentPrepared,
            SupervisorState::ContainerReady,
            SupervisorState::ScriptExecuted,
            SupervisorState::Completed,
        ]
    );
    assert_eq!(engine.subcommands(), vec!["pull", "create", "setup", "run"]);

    let calls = engine.calls();
    assert_eq!(calls[0].args, vec!["pull", "alpine:3.19"]);
    assert_eq!(calls[1].args, vec!["create", "--name=job", "alpine:3.19"]);
    assert_eq!(calls[2].args, vec!["setup", "--execmode=F1", "job"]);
    assert_eq!(calls[3].args[1], "-v");
    assert_eq!(calls[3].args[4], "job");
    assert_eq!(calls[3].args[5], "/bin/sh");
    assert_eq!(calls[3].script.as_deref(), Some("echo 42 > $OUTPUT_FILE"));

    for call in &calls {
        assert!(call.program.ends_with("bin/udocker"));
        assert_eq!(call.mode, 0o755);
        assert_eq!(call.env[0].0, "UDOCKER_DIR");
        assert!(call.env[0].1.ends_with(".udocker"));
    }

    // Scratch directory is gone once the output was read
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn test_pull_failure_stops_at_environment_prepared() {
    let root = tempfile::tempdir().unwrap();
    let engine = FakeEngine {
        fail_on: Some("pull"),
        output: Some("unused"),
        ..Default::default()
    };
    let mut supervisor =
        Supervisor::with_parts(settings(root.path()), FakeFetcher::with_engine(), engine.clone());

    let error = supervisor.execute(&event()).await.unwrap_err();

    assert!(matches!(error, SandboxError::Provisioning { .. }));
    assert_eq!(error.state(), SupervisorState::EnvironmentPrepared);
    assert!(error.to_string().contains("pull failed"));
    assert_eq!(supervisor.state(), SupervisorState::Failed);
    assert!(!supervisor.progress().contains(&SupervisorState::ContainerReady));
    assert!(!supervisor.progress().contains(&SupervisorState::ScriptExecuted));
    assert_eq!(engine.subcommands(), vec!["pull"]);
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn test_setup_failure_is_provisioning() {
    let root = tempfile::tempdir().unwrap();
    let engine = FakeEngine {
        fail_on: Some("setup"),
        ..Default::default()
    };
    let mut supervisor =
        Supervisor::with_parts(settings(root.path()), FakeFetcher::with_engine(), engine.clone());

    let error = supervisor.execute(&event()).await.unwrap_err();
    assert!(matches!(error, SandboxError::Provisioning { .. }));
    assert_eq!(engine.subcommands(), vec!["pull", "create", "setup"]);
}

#[tokio::test]
async fn test_missing_output_file_fails() {
    let root = tempfile::tempdir().unwrap();
    let engine = FakeEngine::default();
    let mut supervisor =
        Supervisor::with_parts(settings(root.path()), FakeFetcher::with_engine(), engine);

    let error = supervisor.execute(&event()).await.unwrap_err();

    assert!(matches!(error, SandboxError::Execution { .. }));
    assert_eq!(error.state(), SupervisorState::ScriptExecuted);
    assert_eq!(supervisor.state(), SupervisorState::Failed);
}

#[tokio::test]
async fn test_script_exit_status_is_execution_error() {
    let root = tempfile::tempdir().unwrap();
    let engine = FakeEngine {
        fail_on: Some("run"),
        ..Default::default()
    };
    let mut supervisor =
        Supervisor::with_parts(settings(root.path()), FakeFetcher::with_engine(), engine);

    let error = supervisor.execute(&event()).await.unwrap_err();
    assert!(matches!(error, SandboxError::Execution { .. }));
    assert_eq!(error.state(), SupervisorState::ContainerReady);
}

#[tokio::test]
async fn test_engine_fetch_failure_is_environment_error() {
    let root = tempfile::tempdir().unwrap();
    let engine = FakeEngine::default();
    let mut supervisor =
        Supervisor::with_parts(settings(root.path()), FakeFetcher::default(), engine.clone());

    let error = supervisor.execute(&event()).await.unwrap_err();

    assert!(matches!(error, SandboxError::Environment { .. }));
    assert_eq!(error.state(), SupervisorState::Idle);
    assert!(engine.subcommands().is_empty());
    assert_eq!(
        supervisor.progress(),
        &[SupervisorState::Idle, SupervisorState::Failed]
    );
}

#[tokio::test]
async fn test_remote_script_is_downloaded() {
    let root = tempfile::tempdir().unwrap();
    let mut fetcher = FakeFetcher::with_engine();
    fetcher.bodies.insert(
        "https://scripts.test/job.sh".to_string(),
        Bytes::from_static(b"echo remote > $OUTPUT_FILE"),
    );
    let engine = FakeEngine {
        output: Some("remote\n"),
        ..Default::default()
    };
    let mut supervisor = Supervisor::with_parts(settings(root.path()), fetcher, engine.clone());

    let event = InvocationEvent::new("alpine:3.19", "https://scripts.test/job.sh");
    let output = supervisor.execute(&event).await.unwrap();

    assert_eq!(&output[..], b"remote\n");
    let run = engine.calls().pop().unwrap();
    assert_eq!(run.script.as_deref(), Some("echo remote > $OUTPUT_FILE"));
}

#[tokio::test]
async fn test_payload_round_trip_through_wire_format() {
    let root = tempfile::tempdir().unwrap();
    let engine = FakeEngine {
        output: Some("ok"),
        ..Default::default()
    };
    let mut supervisor =
        Supervisor::with_parts(settings(root.path()), FakeFetcher::with_engine(), engine);

    let output = supervisor.execute_payload(&event().to_bytes()).await.unwrap();
    assert_eq!(&output[..], b"ok");
}
