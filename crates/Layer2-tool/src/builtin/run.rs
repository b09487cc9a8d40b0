//! run_command - 워크스페이스 안에서 셸 명령 실행

use super::unexpected_output;
use crate::backend::{BackendOutput, Operation};
use crate::output::{truncate_output, MAX_OUTPUT_LENGTH};
use crate::{Tool, ToolArgs, ToolContext};
use async_trait::async_trait;
use forgebox_foundation::{Error, Result, ToolErrorKind, ToolResult, ToolSchema};
use serde_json::json;
use std::time::Duration;

/// Default timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Maximum timeout in seconds
const MAX_TIMEOUT_SECS: u64 = 600;

/// Run tool for executing shell commands
pub struct RunCommandTool;

impl RunCommandTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RunCommandTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::builder(
            "run_command",
            "Execute a shell command inside the workspace. Use this for running programs, tests, git commands, etc.",
        )
        .command_param("command", "The shell command to execute", true)
        .path_param(
            "cwd",
            "Working directory, relative to the workspace root (default: the root)",
            false,
        )
        .integer_param(
            "timeout_secs",
            "Timeout in seconds (default: 60, max: 600)",
            false,
        )
        .build()
    }

    async fn execute(&self, args: ToolArgs, ctx: &ToolContext) -> Result<ToolResult> {
        let command = args.command("command")?.clone();
        let cwd = match args.optional_path("cwd") {
            Some(cwd) => cwd.clone(),
            None => ctx
                .policy()
                .validate_path(".")
                .into_sandbox_path()
                .ok_or_else(|| Error::Internal("workspace root failed validation".into()))?,
        };
        let timeout_secs = args
            .optional_u64("timeout_secs")
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, MAX_TIMEOUT_SECS);

        let output = match ctx
            .perform(Operation::Run {
                command,
                cwd,
                timeout: Duration::from_secs(timeout_secs),
            })
            .await?
        {
            BackendOutput::Command(output) => output,
            other => return Err(unexpected_output("run_command", &other)),
        };

        let data = json!({
            "exitCode": output.exit_code,
            "stdout": truncate_output(&output.stdout, MAX_OUTPUT_LENGTH),
            "stderr": truncate_output(&output.stderr, MAX_OUTPUT_LENGTH),
        });

        if output.success() {
            Ok(ToolResult::success(data))
        } else {
            let status = output
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            Ok(
                ToolResult::error(
                    ToolErrorKind::Execution,
                    format!("command exited with status {}", status),
                )
                .with_data(data),
            )
        }
    }
}
