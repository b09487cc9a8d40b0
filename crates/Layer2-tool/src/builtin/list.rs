//! list_directory - 디렉토리 목록

use super::unexpected_output;
use crate::backend::{BackendOutput, Operation};
use crate::{Tool, ToolArgs, ToolContext};
use async_trait::async_trait;
use forgebox_foundation::{Error, Result, ToolResult, ToolSchema};
use serde_json::json;

pub struct ListDirectoryTool;

impl ListDirectoryTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ListDirectoryTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::builder(
            "list_directory",
            "List files and directories inside the workspace. Recursive listings respect .gitignore.",
        )
        .path_param(
            "path",
            "Directory to list, relative to the workspace root (default: the root)",
            false,
        )
        .boolean_param("recursive", "List subdirectories too (default: false)", false)
        .build()
    }

    async fn execute(&self, args: ToolArgs, ctx: &ToolContext) -> Result<ToolResult> {
        let path = match args.optional_path("path") {
            Some(path) => path.clone(),
            None => ctx
                .policy()
                .validate_path(".")
                .into_sandbox_path()
                .ok_or_else(|| Error::Internal("workspace root failed validation".into()))?,
        };
        let recursive = args.bool_or("recursive", false);
        let display = path.display_relative();

        match ctx.perform(Operation::List { path, recursive }).await? {
            BackendOutput::Entries(entries) => Ok(ToolResult::success(json!({
                "path": display,
                "count": entries.len(),
                "entries": entries,
            }))),
            other => Err(unexpected_output("list_directory", &other)),
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
    async fn test_list_defaults_to_root() {
        let (dir, ctx) = workspace();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();
        let registry =
            ToolRegistry::strict(vec![Arc::new(ListDirectoryTool::new()) as Arc<dyn Tool>])
                .unwrap();

        let result = registry.execute("list_directory", json!({}), &ctx).await;
        assert!(result.success, "{:?}", result);
        let data = result.data.unwrap();
        assert_eq!(data["path"], ".");
        assert_eq!(data["count"], 2);

        let result = registry
            .execute("list_directory", json!({"recursive": true}), &ctx)
            .await;
        assert_eq!(result.data.unwrap()["count"], 3);
    }
}
