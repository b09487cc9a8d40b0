//! OpenAI-compatible chat completions client (non-streaming)

use crate::{
    error::ProviderError,
    r#trait::{FinishReason, ModelClient, ModelRequest, ModelResponse, TokenUsage, ToolChoice},
};
use async_trait::async_trait;
use forgebox_foundation::{Message, ProviderSettings, ToolCall, ToolSchema};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// OpenAI-compatible client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_http_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: None,
        })
    }

    /// 설정에서 생성 (API 키는 환경 변수에서 읽음)
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let key_env = settings
            .api_key_env
            .as_deref()
            .unwrap_or(DEFAULT_API_KEY_ENV);
        let api_key = std::env::var(key_env)
            .map_err(|_| ProviderError::NotConfigured(format!("{} is not set", key_env)))?;

        let mut client = Self::new(
            api_key,
            settings.model.as_deref().unwrap_or(DEFAULT_MODEL),
        )?;
        if let Some(base_url) = &settings.base_url {
            client = client.with_base_url(base_url);
        }
        Ok(client)
    }

    /// Custom base URL (for OpenAI-compatible APIs like Azure, LocalAI, vLLM)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ProviderError> {
        self.client = build_http_client(timeout)?;
        Ok(self)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(&self, request: &ModelRequest) -> OpenAiRequest {
        let tools: Vec<OpenAiTool> = request.tools.iter().map(OpenAiTool::from).collect();
        let tool_choice = (!tools.is_empty()).then_some(request.tool_choice);

        OpenAiRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            max_tokens: self.max_tokens,
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice,
            stream: false,
        }
    }

    /// Parse error response from the API
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> ProviderError {
        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            let error = error_response.error;
            let message = error.message;

            return match error.code.as_deref() {
                Some("rate_limit_exceeded") => ProviderError::RateLimited {
                    retry_after_ms: None,
                },
                Some("context_length_exceeded") => ProviderError::ContextLengthExceeded(message),
                Some("invalid_api_key") => ProviderError::Authentication(message),
                Some("insufficient_quota") => ProviderError::QuotaExceeded(message),
                Some("model_not_found") => ProviderError::ModelNotFound(message),
                Some("content_policy_violation") => ProviderError::ContentFiltered(message),
                _ => ProviderError::from_http_status(status.as_u16(), &message),
            };
        }

        ProviderError::from_http_status(status.as_u16(), body)
    }

    fn parse_response(api_response: OpenAiResponse) -> Result<ModelResponse, ProviderError> {
        let choice =
            api_response.choices.into_iter().next().ok_or_else(|| {
                ProviderError::InvalidResponse("No choices in response".to_string())
            })?;

        let content = choice.message.content.filter(|c| !c.is_empty());

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let args = tc.function.arguments_parsed();
                ToolCall::new(tc.id, tc.function.name, args)
            })
            .collect();

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        };

        Ok(ModelResponse {
            content,
            tool_calls,
            finish_reason,
            usage: api_response.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

fn build_http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e)))
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let body = self.build_request(&request);
        debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, Vec::len),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;
        let api_response: OpenAiResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Self::parse_response(api_response)
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

impl OpenAiFunctionCall {
    /// JSON이 아닌 인자는 문자열 그대로 넘겨 레지스트리가 거부하게 둔다
    fn arguments_parsed(&self) -> serde_json::Value {
        serde_json::from_str(&self.arguments)
            .unwrap_or_else(|_| serde_json::Value::String(self.arguments.clone()))
    }
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// Response types
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// Error types
#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
    code: Option<String>,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        let tool_calls: Vec<OpenAiToolCall> = msg
            .tool_calls()
            .iter()
            .map(|tc| OpenAiToolCall {
                id: tc.id.clone(),
                call_type: "function".to_string(),
                function: OpenAiFunctionCall {
                    name: tc.name.clone(),
                    arguments: tc.arguments.to_string(),
                },
            })
            .collect();

        let tool_call_id = match msg {
            Message::Tool { tool_call_id, .. } => Some(tool_call_id.clone()),
            _ => None,
        };

        OpenAiMessage {
            role: msg.role().to_string(),
            content: msg.content().map(str::to_string),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id,
        }
    }
}

impl From<&ToolSchema> for OpenAiTool {
    fn from(tool: &ToolSchema) -> Self {
        OpenAiTool {
            tool_type: "function".to_string(),
            function: OpenAiFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: serde_json::to_value(&tool.parameters)
                    .unwrap_or_else(|_| serde_json::json!({ "type": "object" })),
            },
        }
    }
}
