//! Model client trait and common types
//!
//! 컨트롤러는 이 계약만 알고 있습니다. 요청은 전체 대화 기록과 도구
//! 스키마, 응답은 텍스트(선택)와 도구 호출 목록입니다.

use crate::error::ProviderError;
use async_trait::async_trait;
use forgebox_foundation::{Message, ToolCall, ToolSchema};
use serde::{Deserialize, Serialize};

/// 도구 선택 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// 모델이 결정
    #[default]
    Auto,
    None,
    Required,
}

/// 모델 요청
#[derive(Debug, Clone, Serialize)]
pub struct ModelRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub tool_choice: ToolChoice,
}

impl ModelRequest {
    pub fn new(messages: Vec<Message>, tools: Vec<ToolSchema>) -> Self {
        Self {
            messages,
            tools,
            tool_choice: ToolChoice::Auto,
        }
    }
}

/// Reason for completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Other,
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// 모델 응답
///
/// 종료 판단은 `tool_calls`가 비었는지로만 합니다. `finish_reason`은 참고용.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Option<TokenUsage>,
}

impl ModelResponse {
    /// 도구 호출 없는 최종 응답
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// 도구 호출 응답
    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
            finish_reason: FinishReason::ToolCalls,
            usage: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Model client trait - implement this to plug in a language model
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// 클라이언트 이름 (로그용)
    fn name(&self) -> &str;

    /// 모델 ID
    fn model(&self) -> &str;

    /// 비스트리밍 완성 요청
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError>;
}
