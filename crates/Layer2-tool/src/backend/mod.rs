//! Execution Backend - 워크스페이스 안에서 실제 I/O를 수행하는 계약
//!
//! 백엔드는 검증을 통과한 `SandboxPath` / `SandboxCommand`만 받습니다.
//! 실패는 `BackendError` 값으로 돌려주며 panic하지 않습니다.
//!
//! - `local.rs` - 호스트 디렉토리 백엔드 (tokio::fs / tokio::process)
//! - `container.rs` - docker/podman exec 백엔드

mod container;
mod local;

pub use container::{ContainerBackend, ContainerRuntime};
pub use local::LocalBackend;

use async_trait::async_trait;
use forgebox_foundation::{Error, SandboxCommand, SandboxPath};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error as ThisError;

// ============================================================================
// Operation
// ============================================================================

/// 백엔드가 수행하는 작업
#[derive(Debug, Clone)]
pub enum Operation {
    Read {
        path: SandboxPath,
    },
    Write {
        path: SandboxPath,
        content: String,
    },
    List {
        path: SandboxPath,
        recursive: bool,
    },
    Delete {
        path: SandboxPath,
    },
    Run {
        command: SandboxCommand,
        cwd: SandboxPath,
        timeout: Duration,
    },
}

impl Operation {
    /// 읽기/목록은 멱등, 쓰기/삭제/실행은 아님 (자동 재시도 금지)
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Operation::Read { .. } | Operation::List { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Read { .. } => "read",
            Operation::Write { .. } => "write",
            Operation::List { .. } => "list",
            Operation::Delete { .. } => "delete",
            Operation::Run { .. } => "run",
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// 디렉토리 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntry {
    /// 요청한 디렉토리 기준 상대 경로
    pub path: String,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// 명령 실행 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// 작업 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutput {
    Content(String),
    Written { bytes: usize },
    Entries(Vec<DirEntry>),
    Deleted,
    Command(CommandOutput),
}

// ============================================================================
// Error
// ============================================================================

/// 백엔드 실패
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// 심볼릭 링크 등으로 실제 경로가 샌드박스를 벗어남
    #[error("Path escapes the sandbox at I/O time: {0}")]
    Escape(String),

    /// 실제 경로가 경로 denylist에 걸림
    #[error("Path resolves to a denied location: {path} ({reason})")]
    Denied { path: String, reason: String },

    #[error("Workspace mismatch: backend serves '{expected}', got '{actual}'")]
    WorkspaceMismatch { expected: String, actual: String },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl BackendError {
    /// 같은 작업을 다시 시도할 가치가 있는 일시적 실패인지
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Io(_) | BackendError::Unavailable(_))
    }

    pub(crate) fn from_io(err: std::io::Error, target: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => BackendError::NotFound(target.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                BackendError::PermissionDenied(target.to_string())
            }
            _ => BackendError::Io(format!("{}: {}", target, err)),
        }
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout(d) => Error::Timeout(format!("backend operation after {:?}", d)),
            BackendError::Escape(msg) => Error::Validation(msg),
            BackendError::Denied { .. } => Error::Validation(err.to_string()),
            BackendError::WorkspaceMismatch { .. } => Error::WorkspaceBinding(err.to_string()),
            other => Error::Execution(other.to_string()),
        }
    }
}

// ============================================================================
// Backend Trait
// ============================================================================

/// 실행 백엔드 계약
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// 백엔드 이름 (로그용)
    fn name(&self) -> &str;

    /// 워크스페이스에서 작업 수행
    async fn execute(
        &self,
        workspace_id: &str,
        operation: Operation,
    ) -> Result<BackendOutput, BackendError>;
}
