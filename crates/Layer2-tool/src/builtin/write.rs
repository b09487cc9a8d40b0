//! write_file - 파일 생성/덮어쓰기

use super::unexpected_output;
use crate::backend::{BackendOutput, Operation};
use crate::{Tool, ToolArgs, ToolContext};
use async_trait::async_trait;
use forgebox_foundation::{Result, ToolResult, ToolSchema};
use serde_json::json;

/// Write tool for creating or overwriting files
pub struct WriteFileTool;

impl WriteFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::builder(
            "write_file",
            "Write content to a file inside the workspace. Creates parent directories and overwrites existing files.",
        )
        .path_param("path", "Path to the file, relative to the workspace root", true)
        .string_param("content", "The full content to write", true)
        .build()
    }

    async fn execute(&self, args: ToolArgs, ctx: &ToolContext) -> Result<ToolResult> {
        let path = args.path("path")?.clone();
        let content = args.str("content")?.to_string();
        let display = path.display_relative();
        let lines = content.lines().count();

        match ctx.perform(Operation::Write { path, content }).await? {
            BackendOutput::Written { bytes } => Ok(ToolResult::success(json!({
                "path": display,
                "bytesWritten": bytes,
                "lines": lines,
            }))
            .with_message(format!("Wrote {} bytes to {}", bytes, display))),
            other => Err(unexpected_output("write_file", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::workspace;
    use crate::ToolRegistry;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_write_creates_parents() {
        let (dir, ctx) = workspace();
        let registry = ToolRegistry::strict(vec![Arc::new(WriteFileTool::new()) as Arc<dyn Tool>])
            .unwrap();

        let result = registry
            .execute(
                "write_file",
                json!({"path": "src/app/page.tsx", "content": "export {}\n"}),
                &ctx,
            )
            .await;
        assert!(result.success, "{:?}", result);
        assert_eq!(result.data.unwrap()["bytesWritten"], 10);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/app/page.tsx")).unwrap(),
            "export {}\n"
        );
    }

    #[tokio::test]
    async fn test_write_to_credentials_denied() {
        let (dir, ctx) = workspace();
        let registry = ToolRegistry::strict(vec![Arc::new(WriteFileTool::new()) as Arc<dyn Tool>])
            .unwrap();

        let result = registry
            .execute(
                "write_file",
                json!({"path": ".env", "content": "TOKEN=1"}),
                &ctx,
            )
            .await;
        assert!(result.is_validation_failure());
        assert!(!dir.path().join(".env").exists());
    }
}
