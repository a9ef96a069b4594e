//! Container bootstrap inside a serverless function
//!
//! A function's execution environment cannot run a container daemon, so the
//! supervisor fetches a user-space engine (udocker) into a scratch
//! directory, pulls and prepares the requested image, runs the user script
//! inside it and returns whatever the script wrote to its output file.
//!
//! The steps run in a fixed order and each one only starts once the previous
//! one succeeded:
//!
//! ```text
//! Idle -> EnvironmentPrepared -> ContainerReady -> ScriptExecuted -> Completed
//!   \___________________\____________________\______________\____> Failed
//! ```

use crate::error::SandboxError;
use crate::fetch::{resolve, Fetcher, HttpFetcher};
use crate::process::{ProcessRunner, TokioRunner};
use crate::settings::SandboxSettings;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use stratus_core::InvocationEvent;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ENGINE_DIR: &str = "bin";
const ENGINE_BINARY: &str = "udocker";
const ENGINE_CONFIG_DIR: &str = ".udocker";
const SCRIPT_FILE: &str = "script.sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    Idle,
    EnvironmentPrepared,
    ContainerReady,
    ScriptExecuted,
    Completed,
    Failed,
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::EnvironmentPrepared => "EnvironmentPrepared",
            Self::ContainerReady => "ContainerReady",
            Self::ScriptExecuted => "ScriptExecuted",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paths of one invocation's scratch directory
#[derive(Debug, Clone)]
struct Scratch {
    root: PathBuf,
}

impl Scratch {
    fn engine(&self) -> PathBuf {
        self.root.join(ENGINE_DIR).join(ENGINE_BINARY)
    }

    fn engine_config(&self) -> PathBuf {
        self.root.join(ENGINE_CONFIG_DIR)
    }

    fn script(&self) -> PathBuf {
        self.root.join(SCRIPT_FILE)
    }
}

/// Runs one invocation event through the engine
pub struct Supervisor<F = HttpFetcher, R = TokioRunner> {
    settings: SandboxSettings,
    fetcher: F,
    runner: R,
    state: SupervisorState,
    progress: Vec<SupervisorState>,
}

impl Supervisor {
    pub fn new(settings: SandboxSettings) -> Self {
        Self::with_parts(settings, HttpFetcher::new(), TokioRunner)
    }
}

impl<F: Fetcher, R: ProcessRunner> Supervisor<F, R> {
    pub fn with_parts(settings: SandboxSettings, fetcher: F, runner: R) -> Self {
        Self {
            settings,
            fetcher,
            runner,
            state: SupervisorState::Idle,
            progress: vec![SupervisorState::Idle],
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Every state reached so far, in order
    pub fn progress(&self) -> &[SupervisorState] {
        &self.progress
    }

    /// Decode a raw event payload and execute it
    pub async fn execute_payload(&mut self, payload: &[u8]) -> Result<Bytes, SandboxError> {
        let event = InvocationEvent::from_slice(payload).map_err(|e| {
            self.advance(SupervisorState::Failed);
            SandboxError::InvalidEvent(e.to_string())
        })?;
        self.execute(&event).await
    }

    /// Run `event` and return the contents of its output file
    pub async fn execute(&mut self, event: &InvocationEvent) -> Result<Bytes, SandboxError> {
        if event.image.trim().is_empty() {
            self.advance(SupervisorState::Failed);
            return Err(SandboxError::InvalidEvent("image is empty".to_string()));
        }

        let scratch = Scratch {
            root: self
                .settings
                .scratch_root
                .join(format!("stratus-{}", Uuid::new_v4().simple())),
        };
        info!(image = %event.image, scratch = %scratch.root.display(), "Starting invocation");

        let result = self.run_steps(event, &scratch).await;

        if let Err(e) = tokio::fs::remove_dir_all(&scratch.root).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(scratch = %scratch.root.display(), error = %e, "Failed to remove scratch directory");
            }
        }

        match &result {
            Ok(output) => {
                self.advance(SupervisorState::Completed);
                info!(bytes = output.len(), "Invocation completed");
            }
            Err(e) => {
                self.advance(SupervisorState::Failed);
                warn!(state = %e.state(), error = %e, "Invocation failed");
            }
        }
        result
    }

    async fn run_steps(
        &mut self,
        event: &InvocationEvent,
        scratch: &Scratch,
    ) -> Result<Bytes, SandboxError> {
        self.prepare_environment(scratch).await?;
        self.advance(SupervisorState::EnvironmentPrepared);

        self.prepare_container(scratch, &event.image).await?;
        self.advance(SupervisorState::ContainerReady);

        self.run_script(scratch, &event.script).await?;
        self.advance(SupervisorState::ScriptExecuted);

        self.collect_output(scratch).await
    }

    fn advance(&mut self, state: SupervisorState) {
        debug!(from = %self.state, to = %state, "State transition");
        self.state = state;
        self.progress.push(state);
    }

    fn environment_error(&self, message: impl std::fmt::Display) -> SandboxError {
        SandboxError::Environment {
            state: self.state,
            message: message.to_string(),
        }
    }

    fn provisioning_error(&self, message: impl std::fmt::Display) -> SandboxError {
        SandboxError::Provisioning {
            state: self.state,
            message: message.to_string(),
        }
    }

    fn execution_error(&self, message: impl std::fmt::Display) -> SandboxError {
        SandboxError::Execution {
            state: self.state,
            message: message.to_string(),
        }
    }

    async fn prepare_environment(&self, scratch: &Scratch) -> Result<(), SandboxError> {
        let engine = scratch.engine();
        let engine_dir = engine
            .parent()
            .ok_or_else(|| self.environment_error("engine path has no parent"))?;

        tokio::fs::create_dir_all(engine_dir)
            .await
            .map_err(|e| self.environment_error(format!("{}: {e}", engine_dir.display())))?;
        tokio::fs::create_dir_all(scratch.engine_config())
            .await
            .map_err(|e| self.environment_error(e))?;

        let binary = resolve(&self.fetcher, &self.settings.udocker_url)
            .await
            .map_err(|e| self.environment_error(format!("fetching engine: {e}")))?;
        tokio::fs::write(&engine, &binary)
            .await
            .map_err(|e| self.environment_error(e))?;
        make_executable(&engine)
            .await
            .map_err(|e| self.environment_error(e))?;

        debug!(engine = %engine.display(), bytes = binary.len(), "Engine installed");
        Ok(())
    }

    async fn prepare_container(&self, scratch: &Scratch, image: &str) -> Result<(), SandboxError> {
        let container = self.settings.container_name.clone();
        let steps = [
            vec!["pull".to_string(), image.to_string()],
            vec![
                "create".to_string(),
                format!("--name={container}"),
                image.to_string(),
            ],
            vec![
                "setup".to_string(),
                format!("--execmode={}", self.settings.exec_mode),
                container.clone(),
            ],
        ];

        for args in steps {
            let output = self
                .engine(scratch, &args)
                .await
                .map_err(|e| self.provisioning_error(format!("{}: {e}", args[0])))?;
            if !output.success() {
                return Err(self.provisioning_error(format!(
                    "{} {}",
                    args[0],
                    output.describe()
                )));
            }
        }

        info!(image = %image, container = %container, "Container ready");
        Ok(())
    }

    async fn run_script(&self, scratch: &Scratch, script: &str) -> Result<(), SandboxError> {
        let body = resolve(&self.fetcher, script)
            .await
            .map_err(|e| self.execution_error(format!("fetching script: {e}")))?;
        let script_path = scratch.script();
        tokio::fs::write(&script_path, &body)
            .await
            .map_err(|e| self.execution_error(e))?;

        let output_path = scratch.root.join(&self.settings.output_file);
        let args = vec![
            "run".to_string(),
            "-v".to_string(),
            scratch.root.display().to_string(),
            format!("--env=OUTPUT_FILE={}", output_path.display()),
            self.settings.container_name.clone(),
            "/bin/sh".to_string(),
            script_path.display().to_string(),
        ];

        let output = self
            .engine(scratch, &args)
            .await
            .map_err(|e| self.execution_error(e))?;
        if !output.stdout.is_empty() {
            debug!(stdout = %output.stdout.trim_end(), "Script output");
        }
        if !output.success() {
            return Err(self.execution_error(format!("script {}", output.describe())));
        }
        Ok(())
    }

    async fn collect_output(&self, scratch: &Scratch) -> Result<Bytes, SandboxError> {
        let path = scratch.root.join(&self.settings.output_file);
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| self.execution_error(format!("reading {}: {e}", path.display())))
    }

    async fn engine(
        &self,
        scratch: &Scratch,
        args: &[String],
    ) -> std::io::Result<crate::process::ProcessOutput> {
        let env = [(
            "UDOCKER_DIR".to_string(),
            scratch.engine_config().display().to_string(),
        )];
        self.runner.run(&scratch.engine(), args, &env).await
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_layout() {
        let scratch = Scratch {
            root: PathBuf::from("/tmp/stratus-x"),
        };
        assert_eq!(scratch.engine(), PathBuf::from("/tmp/stratus-x/bin/udocker"));
        assert_eq!(scratch.engine_config(), PathBuf::from("/tmp/stratus-x/.udocker"));
        assert_eq!(scratch.script(), PathBuf::from("/tmp/stratus-x/script.sh"));
    }

    #[test]
    fn test_new_supervisor_is_idle() {
        let supervisor = Supervisor::new(SandboxSettings::default());
        assert_eq!(supervisor.state(), SupervisorState::Idle);
        assert_eq!(supervisor.progress(), &[SupervisorState::Idle]);
    }

    #[tokio::test]
    async fn test_invalid_payload_fails_from_idle() {
        let mut supervisor = Supervisor::new(SandboxSettings::default());
        let error = supervisor.execute_payload(b"not json").await.unwrap_err();
        assert!(matches!(error, SandboxError::InvalidEvent(_)));
        assert_eq!(error.state(), SupervisorState::Idle);
        assert_eq!(supervisor.state(), SupervisorState::Failed);
    }
}
