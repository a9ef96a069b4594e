//! Stratus - deploy and run container scripts as serverless functions
//!
//! Every command loads one configuration, checks it against the command's
//! field contract and runs it against the emulated cloud kept in the state
//! directory.

mod config;
mod executor;
mod output;

use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stratus_config::ResourceConfig;
use stratus_core::InvocationEvent;
use stratus_provider::local::{DEFAULT_ACCOUNT_ID, DEFAULT_REGION};
use stratus_provider::{Command, Dispatcher, LocalCloud, RmTarget, ServerlessProvider};
use stratus_sandbox::SandboxSettings;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{parse_key_value, script_reference, Overrides};
use crate::executor::SandboxExecutor;

#[derive(Parser, Debug)]
#[command(name = "stratus")]
#[command(about = "Deploy and run container scripts as serverless functions", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "STRATUS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the emulated cloud state
    #[arg(long, global = true, default_value = ".stratus", env = "STRATUS_STATE_DIR")]
    state_dir: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Run synchronous invocations in a local sandbox
    #[arg(long, global = true)]
    local_exec: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "STRATUS_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a function and everything it needs
    Init(InitArgs),
    /// Invoke a function
    Run(RunArgs),
    /// List deployed functions
    Ls(LsArgs),
    /// Remove a function, or all of them
    Rm(RmArgs),
    /// Show a function's logs
    Log(LogArgs),
}

#[derive(Args, Debug)]
struct FunctionArgs {
    /// Function name
    #[arg(short, long)]
    name: Option<String>,

    /// Region to operate in
    #[arg(long)]
    region: Option<String>,
}

#[derive(Args, Debug)]
struct InitArgs {
    #[command(flatten)]
    function: FunctionArgs,

    /// Container image
    #[arg(short, long)]
    image: Option<String>,

    /// Memory in MB
    #[arg(short, long)]
    memory: Option<u32>,

    /// Timeout in seconds
    #[arg(short, long)]
    timeout: Option<u32>,

    /// Storage location whose new objects trigger the function
    #[arg(long)]
    input: Option<String>,

    /// Storage location for results
    #[arg(long)]
    output: Option<String>,

    /// Environment variable for the function, KEY=VALUE
    #[arg(short, long = "env", value_parser = parse_key_value)]
    environment: Vec<(String, String)>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    function: FunctionArgs,

    /// Container image
    #[arg(short, long)]
    image: Option<String>,

    /// Script to run: local file, URL or base64:<data>
    #[arg(short, long)]
    script: Option<String>,

    /// Do not wait for the result
    #[arg(long = "async")]
    asynchronous: bool,
}

#[derive(Args, Debug)]
struct LsArgs {
    /// Only functions whose name contains this
    filter: Option<String>,

    /// Region to operate in
    #[arg(long)]
    region: Option<String>,
}

#[derive(Args, Debug)]
struct RmArgs {
    #[command(flatten)]
    function: FunctionArgs,

    /// Remove every function stratus manages
    #[arg(short, long, conflicts_with = "name")]
    all: bool,
}

#[derive(Args, Debug)]
struct LogArgs {
    #[command(flatten)]
    function: FunctionArgs,

    /// Only lines of this invocation
    #[arg(short, long)]
    request_id: Option<String>,
}

impl FunctionArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            name: self.name.clone(),
            region: self.region.clone(),
            ..Default::default()
        }
    }
}

impl Commands {
    fn overrides(&self) -> Overrides {
        match self {
            Self::Init(args) => Overrides {
                image: args.image.clone(),
                memory: args.memory,
                timeout: args.timeout,
                input: args.input.clone(),
                output: args.output.clone(),
                environment: args.environment.clone(),
                ..args.function.overrides()
            },
            Self::Run(args) => Overrides {
                image: args.image.clone(),
                script: args.script.clone(),
                asynchronous: args.asynchronous,
                ..args.function.overrides()
            },
            Self::Ls(args) => Overrides {
                region: args.region.clone(),
                ..Default::default()
            },
            Self::Rm(args) => args.function.overrides(),
            Self::Log(args) => args.function.overrides(),
        }
    }

    fn into_command(self, config: &ResourceConfig) -> anyhow::Result<Command> {
        Ok(match self {
            Self::Init(_) => Command::Init,
            Self::Run(_) => {
                let script = match config.compute.as_ref().and_then(|c| c.script.as_deref()) {
                    Some(script) => script_reference(script)?,
                    None => "base64:".to_string(),
                };
                let event = InvocationEvent::new(config.image().unwrap_or_default(), script);
                Command::Run {
                    payload: Bytes::from(event.to_bytes()),
                }
            }
            Self::Ls(args) => Command::Ls {
                filter: args.filter,
            },
            Self::Rm(args) => Command::Rm {
                target: if args.all {
                    RmTarget::All
                } else {
                    RmTarget::Named
                },
            },
            Self::Log(args) => Command::Log {
                request_id: args.request_id,
            },
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "stratus={level},stratus_provider={level},stratus_config={level},stratus_sandbox={level}",
                    level = cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut raw = config::load_raw(cli.config.as_deref())?;
    cli.command.overrides().apply(&mut raw);
    let resource = ResourceConfig::from_raw(&raw).normalized();

    let region = resource.region.as_deref().unwrap_or(DEFAULT_REGION);
    let account_id = resource.account_id.as_deref().unwrap_or(DEFAULT_ACCOUNT_ID);
    debug!(region, state_dir = %cli.state_dir.display(), "Opening cloud");

    let mut cloud = LocalCloud::open(&cli.state_dir, account_id, region)?;
    if cli.local_exec {
        let settings = SandboxSettings::install(SandboxSettings::from_env()?);
        cloud = cloud.with_executor(Arc::new(SandboxExecutor::new(settings.clone())));
    }
    let dispatcher = Dispatcher::new(Box::new(ServerlessProvider::new(cloud)));

    let command = cli.command.into_command(&resource)?;
    let mut stdout = std::io::stdout().lock();
    let code = match dispatcher.dispatch(command, &resource).await {
        Ok(result) => output::render(result, cli.json, &mut stdout)?,
        Err(e) => output::report_error(&e, cli.json, &mut stdout)?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
