//! read_file - 파일 내용 읽기

use super::unexpected_output;
use crate::backend::{BackendOutput, Operation};
use crate::{Tool, ToolArgs, ToolContext};
use async_trait::async_trait;
use forgebox_foundation::{Result, ToolResult, ToolSchema};
use serde_json::json;

/// Default line limit
const DEFAULT_LINE_LIMIT: usize = 2000;

/// Read tool for reading file contents
pub struct ReadFileTool;

impl ReadFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::builder(
            "read_file",
            "Read the contents of a file inside the workspace. Returns the file content as text.",
        )
        .path_param("path", "Path to the file, relative to the workspace root", true)
        .integer_param(
            "offset",
            "Line number to start reading from (1-based, default: 1)",
            false,
        )
        .integer_param(
            "limit",
            "Maximum number of lines to read (default: 2000)",
            false,
        )
        .build()
    }

    async fn execute(&self, args: ToolArgs, ctx: &ToolContext) -> Result<ToolResult> {
        let path = args.path("path")?.clone();
        let display = path.display_relative();

        let content = match ctx.perform(Operation::Read { path }).await? {
            BackendOutput::Content(content) => content,
            other => return Err(unexpected_output("read_file", &other)),
        };

        // Apply offset and limit
        let offset = args
            .optional_u64("offset")
            .map(|o| o as usize)
            .unwrap_or(1)
            .saturating_sub(1);
        let limit = args
            .optional_u64("limit")
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_LINE_LIMIT);

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();
        let selected: Vec<&str> = lines.into_iter().skip(offset).take(limit).collect();
        let end_line = offset + selected.len();

        Ok(ToolResult::success(json!({
            "path": display,
            "content": selected.join("\n"),
            "totalLines": total_lines,
            "showingLines": format!("{}-{}", offset + 1, end_line),
            "truncated": total_lines > end_line,
        })))
    }
}
