//! ForgeBox CLI - Main entry point

mod cli;
mod init;

use clap::{Parser, Subcommand};
use forgebox_foundation::ForgeboxConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ForgeBox - sandboxed coding agent for a single workspace
#[derive(Parser, Debug)]
#[command(name = "forgebox")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Sandbox root directory (defaults to the current directory)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Workspace id the session claims
    #[arg(short, long)]
    workspace: Option<String>,

    /// Prompt to run
    #[arg(short, long)]
    prompt: Option<String>,

    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// Base URL for an OpenAI-compatible endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Environment variable holding the API key
    #[arg(long)]
    api_key_env: Option<String>,

    /// Maximum tool calls per turn
    #[arg(long)]
    max_tool_calls: Option<u32>,

    /// Consecutive tool failures tolerated before giving up
    #[arg(long)]
    max_retries: Option<u32>,

    /// Per tool call timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Run operations inside this container instead of on the host
    #[arg(long)]
    container: Option<String>,

    /// Container runtime (docker, podman)
    #[arg(long)]
    runtime: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a starter .forgebox/forgebox.json in the sandbox root
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Args {
    fn project_root(&self) -> anyhow::Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// 파일 설정 위에 CLI 플래그를 덮어쓴다
    fn apply(&self, config: &mut ForgeboxConfig, root: PathBuf) {
        if self.root.is_some() || config.sandbox.root.is_none() {
            config.sandbox.root = Some(root);
        }
        if let Some(workspace) = &self.workspace {
            config.sandbox.workspace_id = Some(workspace.clone());
        }
        if let Some(container) = &self.container {
            config.sandbox.container = Some(container.clone());
        }
        if let Some(runtime) = &self.runtime {
            config.sandbox.container_runtime = Some(runtime.clone());
        }

        if let Some(model) = &self.model {
            config.provider.model = Some(model.clone());
        }
        if let Some(base_url) = &self.base_url {
            config.provider.base_url = Some(base_url.clone());
        }
        if let Some(key_env) = &self.api_key_env {
            config.provider.api_key_env = Some(key_env.clone());
        }

        if self.max_tool_calls.is_some() {
            config.limits.max_tool_calls = self.max_tool_calls;
        }
        if self.max_retries.is_some() {
            config.limits.max_retries = self.max_retries;
        }
        if self.timeout.is_some() {
            config.limits.per_call_timeout_secs = self.timeout;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let root = args.project_root()?;

    if let Some(Command::Init { force }) = &args.command {
        init::init_project(&root, args.workspace.as_deref(), *force)?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(prompt) = args.prompt.clone() else {
        anyhow::bail!("nothing to do: pass --prompt or run `forgebox init`");
    };

    let mut config = ForgeboxConfig::load(&root)?;
    args.apply(&mut config, root);

    let outcome = cli::run_once(&config, &prompt).await?;
    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
