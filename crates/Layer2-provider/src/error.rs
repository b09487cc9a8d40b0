//! Provider-specific error types
//!
//! ProviderError는 모델 클라이언트 관련 세부 에러를 관리합니다.
//! forgebox_foundation::Error와의 변환을 지원합니다.

use crate::retry::{RetryClassification, RetryableError};
use forgebox_foundation::Error as FoundationError;
use thiserror::Error;

/// Errors that can occur during model client operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// API key is missing or invalid
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded{}", .retry_after_ms.map(|ms| format!(", retry after {}ms", ms)).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    /// Context length exceeded
    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// Content was filtered
    #[error("Content filtered: {0}")]
    ContentFiltered(String),

    /// Server error (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Network error (connection failed, DNS, timeout, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// Response body ended or broke mid-transfer
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Invalid request (bad parameters)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid response from API
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Quota exceeded
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Client not configured (missing key, bad base URL)
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// 호출자가 취소함
    #[error("Request cancelled")]
    Cancelled,

    /// Unknown error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl RetryableError for ProviderError {
    fn classify(&self) -> RetryClassification {
        match self {
            // Rate limited - definitely retry
            ProviderError::RateLimited { retry_after_ms } => RetryClassification::RateLimited {
                retry_after_ms: *retry_after_ms,
            },

            // Server errors, network issues, broken streams - retry
            ProviderError::ServerError(_)
            | ProviderError::Network(_)
            | ProviderError::StreamError(_) => RetryClassification::Retry,

            // Everything else - don't retry
            ProviderError::Authentication(_)
            | ProviderError::ContextLengthExceeded(_)
            | ProviderError::ContentFiltered(_)
            | ProviderError::InvalidRequest(_)
            | ProviderError::InvalidResponse(_)
            | ProviderError::ModelNotFound(_)
            | ProviderError::QuotaExceeded(_)
            | ProviderError::NotConfigured(_)
            | ProviderError::Cancelled
            | ProviderError::Unknown(_) => RetryClassification::NoRetry,
        }
    }

    fn cancelled() -> Self {
        ProviderError::Cancelled
    }
}

impl ProviderError {
    /// Create from HTTP status code and body
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ProviderError::Authentication(body.to_string()),
            429 => ProviderError::RateLimited {
                retry_after_ms: extract_retry_after(body),
            },
            400 => {
                if body.contains("context") || body.contains("too long") || body.contains("token") {
                    ProviderError::ContextLengthExceeded(body.to_string())
                } else {
                    ProviderError::InvalidRequest(body.to_string())
                }
            }
            404 => ProviderError::ModelNotFound(body.to_string()),
            500..=599 => ProviderError::ServerError(body.to_string()),
            _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
        }
    }

    /// reqwest 전송 에러 분류
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_body() || err.is_decode() {
            ProviderError::StreamError(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classify() != RetryClassification::NoRetry
    }
}

/// Try to extract retry-after value from error body (in milliseconds)
fn extract_retry_after(body: &str) -> Option<u64> {
    // Try to find retry_after in JSON
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(secs) = json
            .get("error")
            .and_then(|e| e.get("retry_after"))
            .and_then(|v| v.as_f64())
        {
            return Some((secs * 1000.0) as u64);
        }
    }

    // Try to find in plain text
    if let Some(idx) = body.find("retry") {
        let num_str: String = body[idx..]
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        if let Ok(secs) = num_str.parse::<f64>() {
            return Some((secs * 1000.0) as u64);
        }
    }

    None
}

// ============================================================================
// forgebox_foundation::Error 변환
// ============================================================================

impl From<ProviderError> for FoundationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RateLimited { retry_after_ms } => FoundationError::RateLimited(
                retry_after_ms
                    .map(|ms| format!("Retry after {}ms", ms))
                    .unwrap_or_else(|| "Rate limited".to_string()),
            ),
            ProviderError::QuotaExceeded(msg) => FoundationError::RateLimited(msg),
            ProviderError::NotConfigured(msg) => FoundationError::Config(msg),
            ProviderError::Cancelled => FoundationError::Cancelled,
            other => FoundationError::Provider(other.to_string()),
        }
    }
}
