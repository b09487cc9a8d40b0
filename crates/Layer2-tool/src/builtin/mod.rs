//! Builtin tools for ForgeBox
//!
//! 모든 내장 도구는 `ToolContext::perform`을 통해서만 I/O를 수행합니다.

pub mod delete;
pub mod edit;
pub mod list;
pub mod read;
pub mod run;
pub mod write;

use crate::backend::BackendOutput;
use crate::Tool;
use forgebox_foundation::Error;
use std::sync::Arc;

pub use delete::DeleteFileTool;
pub use edit::EditFileTool;
pub use list::ListDirectoryTool;
pub use read::ReadFileTool;
pub use run::RunCommandTool;
pub use write::WriteFileTool;

/// strict 레지스트리에 올라가는 내장 도구 테이블 (등록 순서 = 노출 순서)
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ReadFileTool::new()),
        Arc::new(WriteFileTool::new()),
        Arc::new(EditFileTool::new()),
        Arc::new(ListDirectoryTool::new()),
        Arc::new(DeleteFileTool::new()),
        Arc::new(RunCommandTool::new()),
    ]
}

/// 백엔드가 작업 종류와 맞지 않는 출력을 돌려줌
pub(crate) fn unexpected_output(tool: &str, output: &BackendOutput) -> Error {
    Error::tool_execution(tool, format!("unexpected backend output: {:?}", output))
}
