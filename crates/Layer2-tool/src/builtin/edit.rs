//! edit_file - 문자열 치환으로 파일 일부 수정

use super::unexpected_output;
use crate::backend::{BackendOutput, Operation};
use crate::{Tool, ToolArgs, ToolContext};
use async_trait::async_trait;
use forgebox_foundation::{Result, ToolErrorKind, ToolResult, ToolSchema};
use serde_json::json;

/// Edit tool for modifying portions of files
pub struct EditFileTool;

impl EditFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EditFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::builder(
            "edit_file",
            "Edit a file by replacing a specific string with new content. The old_string must uniquely identify the location to edit - include enough context (3-5 surrounding lines) to make it unique.",
        )
        .path_param("path", "Path to the file, relative to the workspace root", true)
        .string_param(
            "old_string",
            "The exact string to find and replace. Must be unique in the file unless replace_all is true.",
            true,
        )
        .string_param(
            "new_string",
            "The string to replace old_string with. Use empty string to delete.",
            true,
        )
        .boolean_param(
            "replace_all",
            "Replace all occurrences instead of requiring uniqueness (default: false)",
            false,
        )
        .build()
    }

    async fn execute(&self, args: ToolArgs, ctx: &ToolContext) -> Result<ToolResult> {
        let path = args.path("path")?.clone();
        let old_string = args.str("old_string")?;
        let new_string = args.str("new_string")?;
        let replace_all = args.bool_or("replace_all", false);
        let display = path.display_relative();

        if old_string.is_empty() {
            return Ok(ToolResult::error(
                ToolErrorKind::InvalidArguments,
                "old_string must not be empty. Use write_file to create a file.",
            ));
        }
        if old_string == new_string {
            return Ok(ToolResult::error(
                ToolErrorKind::InvalidArguments,
                "old_string and new_string are identical",
            ));
        }

        let content = match ctx.perform(Operation::Read { path: path.clone() }).await? {
            BackendOutput::Content(content) => content,
            other => return Err(unexpected_output("edit_file", &other)),
        };

        let occurrences = content.matches(old_string).count();
        if occurrences == 0 {
            return Ok(ToolResult::error(
                ToolErrorKind::Execution,
                format!(
                    "old_string not found in {}. Make sure it matches exactly, including whitespace and indentation.",
                    display
                ),
            ));
        }
        if occurrences > 1 && !replace_all {
            return Ok(ToolResult::error(
                ToolErrorKind::Execution,
                format!(
                    "Found {} occurrences of old_string in {}. Include more context to make it unique, or set replace_all: true.",
                    occurrences, display
                ),
            ));
        }

        let updated = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };
        let lines_changed =
            new_string.lines().count() as i64 - old_string.lines().count() as i64;

        match ctx
            .perform(Operation::Write {
                path,
                content: updated,
            })
            .await?
        {
            BackendOutput::Written { .. } => Ok(ToolResult::success(json!({
                "path": display,
                "replacements": occurrences,
                "linesChanged": lines_changed,
            }))),
            other => Err(unexpected_output("edit_file", &other)),
        }
    }
}
