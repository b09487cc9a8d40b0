//! # forgebox-tool
//!
//! Tool system for ForgeBox providing:
//! - Tool trait and registry (open / strict)
//! - 인자 스키마 검사 + 경로/명령어 보안 해석 (`ToolArgs`)
//! - Builtin tools (read_file, write_file, edit_file, list_directory, delete_file, run_command)
//! - ExecutionBackend 계약과 로컬/컨테이너 백엔드

pub mod args;
pub mod backend;
pub mod builtin;
pub mod context;
pub mod output;
pub mod registry;
pub mod r#trait;

pub use args::{resolve_arguments, ToolArgs};
pub use context::ToolContext;
pub use r#trait::Tool;
pub use registry::ToolRegistry;

// Re-export backends
pub use backend::{
    BackendError, BackendOutput, CommandOutput, ContainerBackend, ContainerRuntime, DirEntry,
    ExecutionBackend, LocalBackend, Operation,
};

// Re-export builtin tools
pub use builtin::{
    builtin_tools, DeleteFileTool, EditFileTool, ListDirectoryTool, ReadFileTool, RunCommandTool,
    WriteFileTool,
};
