//! Limits Configuration - 에이전트 루프 예산 설정
//!
//! 도구 호출 수, 연속 실패 허용 횟수, 호출별 타임아웃,
//! 모델 왕복 횟수, 전체 실행 시간 제한.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_TOOL_CALLS: u32 = 25;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_PER_CALL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;
pub const DEFAULT_MAX_WALL_CLOCK_SECS: u64 = 900;
pub const DEFAULT_MODEL_RETRIES: u32 = 2;

/// 세션 예산 (확정 값)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionBudget {
    /// 턴당 최대 도구 호출 수
    pub max_tool_calls: u32,
    /// 허용되는 연속 실패 수
    pub max_retries: u32,
    /// 호출별 타임아웃
    pub per_call_timeout: Duration,
    /// 턴당 최대 모델 왕복 수
    pub max_iterations: u32,
    /// 턴당 최대 실행 시간
    pub max_wall_clock: Duration,
    /// 모델 클라이언트 재시도 횟수
    pub model_retries: u32,
}

impl Default for SessionBudget {
    fn default() -> Self {
        Self {
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            max_retries: DEFAULT_MAX_RETRIES,
            per_call_timeout: Duration::from_secs(DEFAULT_PER_CALL_TIMEOUT_SECS),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_wall_clock: Duration::from_secs(DEFAULT_MAX_WALL_CLOCK_SECS),
            model_retries: DEFAULT_MODEL_RETRIES,
        }
    }
}

impl SessionBudget {
    pub fn with_max_tool_calls(mut self, max: u32) -> Self {
        self.max_tool_calls = max;
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_per_call_timeout(mut self, timeout: Duration) -> Self {
        self.per_call_timeout = timeout;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_wall_clock(mut self, limit: Duration) -> Self {
        self.max_wall_clock = limit;
        self
    }

    pub fn with_model_retries(mut self, retries: u32) -> Self {
        self.model_retries = retries;
        self
    }
}

/// 설정 파일의 `limits` 섹션 (모든 필드 선택)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_call_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wall_clock_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_retries: Option<u32>,
}

impl LimitsConfig {
    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: LimitsConfig) {
        if other.max_tool_calls.is_some() {
            self.max_tool_calls = other.max_tool_calls;
        }
        if other.max_retries.is_some() {
            self.max_retries = other.max_retries;
        }
        if other.per_call_timeout_secs.is_some() {
            self.per_call_timeout_secs = other.per_call_timeout_secs;
        }
        if other.max_iterations.is_some() {
            self.max_iterations = other.max_iterations;
        }
        if other.max_wall_clock_secs.is_some() {
            self.max_wall_clock_secs = other.max_wall_clock_secs;
        }
        if other.model_retries.is_some() {
            self.model_retries = other.model_retries;
        }
    }

    /// 비어있는 필드는 기본값으로 채워 확정
    pub fn resolve(&self) -> SessionBudget {
        let defaults = SessionBudget::default();
        SessionBudget {
            max_tool_calls: self.max_tool_calls.unwrap_or(defaults.max_tool_calls),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            per_call_timeout: self
                .per_call_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.per_call_timeout),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            max_wall_clock: self
                .max_wall_clock_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_wall_clock),
            model_retries: self.model_retries.unwrap_or(defaults.model_retries),
        }
    }
}

impl From<SessionBudget> for LimitsConfig {
    fn from(budget: SessionBudget) -> Self {
        Self {
            max_tool_calls: Some(budget.max_tool_calls),
            max_retries: Some(budget.max_retries),
            per_call_timeout_secs: Some(budget.per_call_timeout.as_secs()),
            max_iterations: Some(budget.max_iterations),
            max_wall_clock_secs: Some(budget.max_wall_clock.as_secs()),
            model_retries: Some(budget.model_retries),
        }
    }
}
