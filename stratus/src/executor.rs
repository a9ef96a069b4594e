//! Local execution of invocations through the sandbox supervisor

use async_trait::async_trait;
use bytes::Bytes;
use stratus_provider::cloud::FunctionInfo;
use stratus_provider::FunctionExecutor;
use stratus_sandbox::{SandboxSettings, Supervisor};
use tracing::info;

/// Runs each synchronous invocation in a fresh supervisor on this machine
pub struct SandboxExecutor {
    settings: SandboxSettings,
}

impl SandboxExecutor {
    pub fn new(settings: SandboxSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl FunctionExecutor for SandboxExecutor {
    async fn execute(&self, function: &FunctionInfo, payload: Bytes) -> Result<Bytes, String> {
        info!(function_name = %function.name(), "Running invocation in local sandbox");
        let mut supervisor = Supervisor::new(self.settings.clone());
        supervisor
            .execute_payload(&payload)
            .await
            .map_err(|e| e.to_string())
    }
}
