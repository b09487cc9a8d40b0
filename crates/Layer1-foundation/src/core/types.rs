//! Core Types - 공용 타입 정의
//!
//! 모든 레이어에서 공통으로 사용하는 대화/도구 타입들

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Conversation Message
// ============================================================================

/// 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// 대화 메시지 (tagged variant)
///
/// 세션 히스토리는 이 타입의 append-only 리스트입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Tool 호출을 포함한 assistant 메시지
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content,
            tool_calls,
        }
    }

    /// Tool 결과 메시지 - ToolResult를 JSON으로 직렬화해서 담는다
    pub fn tool_result(tool_call_id: impl Into<String>, result: &ToolResult) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: result.to_json_string(),
        }
    }

    pub fn role(&self) -> MessageRole {
        match self {
            Message::System { .. } => MessageRole::System,
            Message::User { .. } => MessageRole::User,
            Message::Assistant { .. } => MessageRole::Assistant,
            Message::Tool { .. } => MessageRole::Tool,
        }
    }

    /// 텍스트 내용 (assistant가 tool 호출만 한 경우 None)
    pub fn content(&self) -> Option<&str> {
        match self {
            Message::System { content } | Message::User { content } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
            Message::Tool { content, .. } => Some(content),
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

// ============================================================================
// Tool Call
// ============================================================================

/// 모델이 요청한 도구 호출
///
/// 응답 파서가 생성하고 컨트롤러가 정확히 한 번 소비합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// 상관관계 토큰 (tool 메시지의 tool_call_id와 매칭)
    pub id: String,

    /// 호출할 도구 이름
    pub name: String,

    /// 인자 (JSON)
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

// ============================================================================
// Tool Result
// ============================================================================

/// 실패 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// 경로/명령어/바인딩 보안 검증 실패
    Validation,
    /// 스키마와 맞지 않는 인자
    InvalidArguments,
    /// 등록되지 않은 도구
    UnknownTool,
    /// 백엔드 I/O 또는 명령 실패
    Execution,
    /// 호출별 deadline 초과
    Timeout,
    /// 핸들러 내부 에러 또는 panic
    HandlerFault,
    /// 예산/취소로 실행되지 않음
    Skipped,
}

/// 도구 실행 결과
///
/// 레지스트리 경계를 넘어 예외로 던져지지 않는 종단 값입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ToolErrorKind>,
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            kind: None,
        }
    }

    pub fn error(kind: ToolErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
            kind: Some(kind),
        }
    }

    /// 호출별 타임아웃 결과
    pub fn timeout() -> Self {
        Self::error(ToolErrorKind::Timeout, "timeout")
    }

    /// 실행되지 않은 호출 (예산 초과, 취소 등)
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::error(ToolErrorKind::Skipped, "not executed").with_message(reason)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self.kind,
            Some(ToolErrorKind::Validation) | Some(ToolErrorKind::InvalidArguments)
        )
    }

    /// 사람이 읽을 수 있는 실패 요약
    pub fn failure_summary(&self) -> String {
        match (&self.error, &self.message) {
            (Some(error), Some(message)) => format!("{}: {}", error, message),
            (Some(error), None) => error.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) if self.success => "ok".to_string(),
            (None, None) => "unknown failure".to_string(),
        }
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"success":{},"error":"unserializable tool result: {}"}}"#,
                self.success, e
            )
        })
    }
}
