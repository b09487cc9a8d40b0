//! Core Module - 핵심 데이터 타입
//!
//! - `types.rs`: 대화 메시지, 도구 호출, 도구 결과
//! - `schema.rs`: 도구 스키마와 파라미터 명세

pub mod schema;
pub mod types;

// Message & Role
pub use types::{Message, MessageRole};

// Tool Call / Result
pub use types::{ToolCall, ToolErrorKind, ToolResult};

// Schema
pub use schema::{ParamSpec, ParamType, Sensitivity, ToolParameters, ToolSchema, ToolSchemaBuilder};
