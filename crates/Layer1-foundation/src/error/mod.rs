//! Error types for ForgeBox
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// ForgeBox 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 보안 검증 관련
    // ========================================================================
    /// 경로/명령어/워크스페이스 바인딩 거부 (재시도 대상 아님)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Workspace binding rejected: {0}")]
    WorkspaceBinding(String),

    // ========================================================================
    // Tool Registry 관련
    // ========================================================================
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Registry is sealed, cannot register tool: {0}")]
    RegistrySealed(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool} - {message}")]
    ToolExecution { tool: String, message: String },

    // ========================================================================
    // 실행 관련
    // ========================================================================
    /// 백엔드 I/O 또는 명령 실패
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // Provider 관련
    // ========================================================================
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 재시도 가능한 에러인지 확인
    ///
    /// 검증 실패는 같은 입력으로 다시 시도해도 결과가 같으므로 제외됩니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Execution(_) | Error::Timeout(_) | Error::RateLimited(_) | Error::Io(_)
        )
    }

    /// 세션을 즉시 종료시키는 에러인지 확인
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::BudgetExceeded(_) | Error::Cancelled | Error::WorkspaceBinding(_)
        )
    }

    /// Tool 실행 에러 생성 헬퍼
    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
