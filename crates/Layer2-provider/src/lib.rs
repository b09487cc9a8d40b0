//! # forgebox-provider
//!
//! Model client abstraction layer for ForgeBox.
//!
//! ## Features
//! - `ModelClient` 계약: `{ messages, tools, tool_choice }` → `{ content, tool_calls }`
//! - Automatic retry with exponential backoff (취소 가능)
//! - OpenAI-compatible client
//! - Scripted client for tests and offline runs

pub mod error;
pub mod providers;
pub mod retry;
pub mod r#trait;

// Core trait and types
pub use r#trait::{FinishReason, ModelClient, ModelRequest, ModelResponse, TokenUsage, ToolChoice};

// Error and retry
pub use error::ProviderError;
pub use retry::{with_retry, RetryClassification, RetryConfig, RetryableError};

// Client implementations
pub use providers::openai::OpenAiClient;
pub use providers::scripted::ScriptedClient;
