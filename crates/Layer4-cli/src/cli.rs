//! Non-interactive CLI mode

use anyhow::Context;
use forgebox_agent::{AgentController, AgentEvent, AgentOutcome, AgentSession, CancellationToken};
use forgebox_foundation::{ForgeboxConfig, SandboxPolicy};
use forgebox_provider::{ModelClient, OpenAiClient};
use forgebox_tool::{
    ContainerBackend, ContainerRuntime, ExecutionBackend, LocalBackend, ToolRegistry,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Run a single prompt against the configured workspace
pub async fn run_once(config: &ForgeboxConfig, prompt: &str) -> anyhow::Result<AgentOutcome> {
    let policy = Arc::new(
        config
            .sandbox
            .build_policy()
            .context("invalid sandbox configuration")?,
    );
    let budget = config.limits.resolve();
    let backend = build_backend(config, &policy)?;
    let client = Arc::new(
        OpenAiClient::from_settings(&config.provider).context("model client is not configured")?,
    );

    println!(
        "ForgeBox - {} ({} backend, model {})\n",
        policy.sandbox_root().display(),
        backend.name(),
        client.model(),
    );

    // Create event channel
    let (tx, mut rx) = mpsc::channel(100);
    let controller =
        AgentController::new(ToolRegistry::builtin()?, backend, client).with_events(tx);

    let workspace_id = config
        .sandbox
        .workspace_id
        .clone()
        .unwrap_or_else(|| policy.authorized_workspace_id().to_string());
    let mut session = AgentSession::new(Arc::clone(&policy), workspace_id, budget);

    // Ctrl-C → 진행 중인 턴 취소
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            ctrl_c.cancel();
        }
    });

    // Spawn event handler
    let event_handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::ToolStart { tool_name, .. } => {
                    println!("[{}] Running...", tool_name);
                }
                AgentEvent::ToolComplete {
                    tool_name,
                    success,
                    summary,
                    ..
                } => {
                    let status = if success { "✓" } else { "✗" };
                    let detail = summary.map(|s| truncate(&s, 100)).unwrap_or_default();
                    println!("[{}] {} {}", tool_name, status, detail);
                }
                AgentEvent::ToolSkipped { tool_call_id } => {
                    println!("[{}] skipped", tool_call_id);
                }
                _ => {}
            }
        }
    });

    let outcome = controller.run_agent(&mut session, prompt, &cancel).await;

    // Wait for event handler to finish
    drop(controller);
    let _ = event_handle.await;

    match (outcome.success, outcome.failure_reason) {
        (true, _) => println!("\n{}", outcome.message),
        (false, Some(reason)) => eprintln!("\nFailed ({}): {}", reason, outcome.message),
        (false, None) => eprintln!("\nFailed: {}", outcome.message),
    }
    println!("\n[Tool calls: {}]", outcome.tool_calls_executed);

    Ok(outcome)
}

/// 설정에 컨테이너가 있으면 컨테이너 백엔드, 아니면 로컬
fn build_backend(
    config: &ForgeboxConfig,
    policy: &Arc<SandboxPolicy>,
) -> anyhow::Result<Arc<dyn ExecutionBackend>> {
    let sandbox = &config.sandbox;
    match &sandbox.container {
        Some(container) => {
            let runtime = match sandbox.container_runtime.as_deref() {
                Some(name) => ContainerRuntime::parse(name)
                    .with_context(|| format!("unknown container runtime '{}'", name))?,
                None => ContainerRuntime::default(),
            };
            tracing::info!(%container, runtime = runtime.command(), "Using container backend");
            Ok(Arc::new(ContainerBackend::new(
                runtime,
                container.clone(),
                policy.authorized_workspace_id(),
            )))
        }
        None => Ok(Arc::new(LocalBackend::new(Arc::clone(policy)))),
    }
}

/// Truncate a string for display
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ");
    if s.chars().count() <= max_len {
        s
    } else {
        let cut: String = s.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}
