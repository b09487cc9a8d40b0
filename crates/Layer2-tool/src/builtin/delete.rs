//! delete_file - 파일 삭제

use crate::backend::{BackendOutput, Operation};
use crate::{Tool, ToolArgs, ToolContext};
use async_trait::async_trait;
use forgebox_foundation::{Result, ToolResult, ToolSchema};
use serde_json::json;

pub struct DeleteFileTool;

impl DeleteFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeleteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::builder(
            "delete_file",
            "Delete a single file inside the workspace. Directories are not deleted.",
        )
        .path_param("path", "Path to the file, relative to the workspace root", true)
        .build()
    }

    async fn execute(&self, args: ToolArgs, ctx: &ToolContext) -> Result<ToolResult> {
        let path = args.path("path")?.clone();
        let display = path.display_relative();

        match ctx.perform(Operation::Delete { path }).await? {
            BackendOutput::Deleted => Ok(ToolResult::success(json!({ "path": display }))
                .with_message(format!("Deleted {}", display))),
            other => Err(super::unexpected_output("delete_file", &other)),
        }
    }
}
