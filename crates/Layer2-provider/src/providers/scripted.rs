//! Scripted client - 큐에 쌓인 응답을 순서대로 돌려주는 결정적 모델 클라이언트
//!
//! 테스트와 오프라인 데모용. 받은 요청은 모두 기록됩니다.

use crate::{
    error::ProviderError,
    r#trait::{ModelClient, ModelRequest, ModelResponse},
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

type Scripted = Result<ModelResponse, ProviderError>;

/// 재생용 모델 클라이언트
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ModelRequest>>,
    latency: Option<Duration>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 응답 목록으로 생성
    pub fn with_responses(responses: impl IntoIterator<Item = ModelResponse>) -> Self {
        let client = Self::new();
        for response in responses {
            client.push_response(response);
        }
        client
    }

    /// 응답마다 지연 (취소 테스트용)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_response(&self, response: ModelResponse) {
        lock(&self.script).push_back(Ok(response));
    }

    pub fn push_error(&self, error: ProviderError) {
        lock(&self.script).push_back(Err(error));
    }

    /// 아직 재생되지 않은 항목 수
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    /// 지금까지 받은 요청
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        lock(&self.requests).push(request);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        lock(&self.script).pop_front().unwrap_or_else(|| {
            Err(ProviderError::InvalidResponse(
                "scripted client has no responses left".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgebox_foundation::{Message, ToolCall};
    use serde_json::json;

    #[tokio::test]
    async fn test_replays_in_order_and_records_requests() {
        let client = ScriptedClient::with_responses([
            ModelResponse::with_tool_calls(vec![ToolCall::new(
                "call_1",
                "list_directory",
                json!({}),
            )]),
            ModelResponse::text("done"),
        ]);
        client.push_error(ProviderError::ServerError("boom".into()));

        let request = ModelRequest::new(vec![Message::user("go")], vec![]);
        assert!(client.complete(request.clone()).await.unwrap().has_tool_calls());
        assert_eq!(
            client.complete(request.clone()).await.unwrap().content.as_deref(),
            Some("done")
        );
        assert!(matches!(
            client.complete(request.clone()).await,
            Err(ProviderError::ServerError(_))
        ));
        assert!(matches!(
            client.complete(request).await,
            Err(ProviderError::InvalidResponse(_))
        ));
        assert_eq!(client.request_count(), 4);
        assert_eq!(client.remaining(), 0);
    }
}
