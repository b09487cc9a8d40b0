//! Agent outcome - `run_agent`의 반환값

use serde::Serialize;

/// 실패 원인
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// maxToolCalls 도달
    BudgetExceeded,
    /// 연속 실패가 maxRetries를 넘음
    RetriesExhausted,
    /// maxIterations (모델 왕복) 도달
    IterationCap,
    /// maxWallClock 초과
    WallClock,
    /// 모델 클라이언트 에러 (재시도 후)
    ModelClient,
    /// 호출자가 취소
    Cancelled,
    /// 세션이 주장한 워크스페이스가 정책과 다름
    WorkspaceBinding,
}

impl FailureReason {
    /// 예산 계열 실패 (tool calls, iterations, wall clock)
    pub fn is_budget(&self) -> bool {
        matches!(
            self,
            FailureReason::BudgetExceeded | FailureReason::IterationCap | FailureReason::WallClock
        )
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::BudgetExceeded => "tool call budget exceeded",
            FailureReason::RetriesExhausted => "too many consecutive tool failures",
            FailureReason::IterationCap => "iteration cap reached",
            FailureReason::WallClock => "wall clock budget exceeded",
            FailureReason::ModelClient => "model client error",
            FailureReason::Cancelled => "cancelled",
            FailureReason::WorkspaceBinding => "workspace binding rejected",
        };
        write!(f, "{}", s)
    }
}

/// `run_agent` 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutcome {
    pub success: bool,
    /// 최종 답변 또는 실패 설명
    pub message: String,
    /// 이번 턴에 실행된 도구 호출 수
    pub tool_calls_executed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

impl AgentOutcome {
    pub fn done(message: impl Into<String>, tool_calls_executed: u32) -> Self {
        Self {
            success: true,
            message: message.into(),
            tool_calls_executed,
            failure_reason: None,
        }
    }

    pub fn failed(
        reason: FailureReason,
        message: impl Into<String>,
        tool_calls_executed: u32,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            tool_calls_executed,
            failure_reason: Some(reason),
        }
    }
}
