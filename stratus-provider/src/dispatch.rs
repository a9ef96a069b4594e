//! Uniform command dispatch
//!
//! Every command goes through [`Dispatcher::dispatch`]: configuration
//! invariants first, then the command's field contract, then the provider.
//! Nothing reaches a provider unless both checks pass.

use crate::contract::{
    DeletionResult, InvocationResult, LogStream, Provider, ResourceHandle, ResourceSummary,
    RmTarget,
};
use crate::error::DispatchError;
use bytes::Bytes;
use stratus_config::{require, CommandKind, ResourceConfig};
use tracing::{debug, info};

/// A command and its arguments
#[derive(Debug, Clone)]
pub enum Command {
    Init,
    Run { payload: Bytes },
    Ls { filter: Option<String> },
    Rm { target: RmTarget },
    Log { request_id: Option<String> },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Init => CommandKind::Init,
            Self::Run { .. } => CommandKind::Run,
            Self::Ls { .. } => CommandKind::Ls,
            Self::Rm {
                target: RmTarget::Named,
            } => CommandKind::Rm,
            Self::Rm {
                target: RmTarget::All,
            } => CommandKind::RmAll,
            Self::Log { .. } => CommandKind::Log,
        }
    }
}

/// Result of a dispatched command
#[derive(Debug)]
pub enum CommandOutput {
    Initialized(ResourceHandle),
    Invoked(InvocationResult),
    Listed(Vec<ResourceSummary>),
    Removed(DeletionResult),
    Logs(LogStream),
}

/// Validates configurations and routes commands to one provider
pub struct Dispatcher {
    provider: Box<dyn Provider>,
}

impl Dispatcher {
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Check `config` for `command` without running it
    pub fn validate(command: &Command, config: &ResourceConfig) -> Result<(), DispatchError> {
        config.check_invariants()?;
        require(command.kind(), config)?;
        Ok(())
    }

    pub async fn dispatch(
        &self,
        command: Command,
        config: &ResourceConfig,
    ) -> Result<CommandOutput, DispatchError> {
        Self::validate(&command, config)?;

        let kind = command.kind();
        debug!(command = %kind, provider = self.provider.name(), "Dispatching command");

        let output = match command {
            Command::Init => CommandOutput::Initialized(self.provider.init(config).await?),
            Command::Run { payload } => {
                CommandOutput::Invoked(self.provider.run(config, payload).await?)
            }
            Command::Ls { filter } => {
                CommandOutput::Listed(self.provider.ls(config, filter.as_deref()).await?)
            }
            Command::Rm { target } => CommandOutput::Removed(self.provider.rm(config, target).await?),
            Command::Log { request_id } => {
                CommandOutput::Logs(self.provider.log(config, request_id.as_deref()).await?)
            }
        };

        info!(command = %kind, "Command completed");
        Ok(output)
    }
}
