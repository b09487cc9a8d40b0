//! # forgebox-foundation
//!
//! Foundation layer for ForgeBox:
//! - Core: 대화 메시지, 도구 호출/결과, 도구 스키마
//! - Security: SandboxPolicy + 경로/명령어/워크스페이스 검증
//! - Storage: JsonStore (설정 파일)
//! - Config: 통합 설정 (ForgeboxConfig, 세션 예산)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  AgentController (Layer3)                               │
//! │          │ tool calls                                   │
//! │          ▼                                              │
//! │  ToolRegistry (Layer2) ── schema check                  │
//! │          │                                              │
//! │          ▼                                              │
//! │  SecurityValidator (여기) ── SandboxPolicy               │
//! │          │ SandboxPath / SandboxCommand                 │
//! │          ▼                                              │
//! │  ExecutionBackend (Layer2)                              │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod security;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Core (공용 타입)
// ============================================================================
pub use self::core::{
    // Message & Role
    Message,
    MessageRole,
    // Tool Call / Result
    ToolCall,
    ToolErrorKind,
    ToolResult,
    // Schema
    ParamSpec,
    ParamType,
    Sensitivity,
    ToolParameters,
    ToolSchema,
    ToolSchemaBuilder,
};

// ============================================================================
// Security (샌드박스 정책 및 검증)
// ============================================================================
pub use security::{
    validate_command, validate_path, validate_workspace_binding, DenyPattern, PatternKind,
    PatternSpec, SandboxCommand, SandboxPath, SandboxPolicy, SandboxPolicyBuilder,
    ValidationResult,
};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;

// ============================================================================
// Config
// ============================================================================
pub use config::{
    ForgeboxConfig, LimitsConfig, ProviderSettings, SandboxSettings, SessionBudget, CONFIG_FILE,
};
