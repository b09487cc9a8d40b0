//! Agent state machine
//!
//! `AwaitingModel → ExecutingTools → AwaitingModel → … → Done | Failed`

use serde::Serialize;

/// 컨트롤러 루프 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// 모델 응답 대기 중
    AwaitingModel,
    /// Tool 실행 중
    ExecutingTools,
    /// 완료
    Done,
    /// 실패로 종료
    Failed,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Done | AgentState::Failed)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::AwaitingModel => write!(f, "AWAITING_MODEL"),
            AgentState::ExecutingTools => write!(f, "EXECUTING_TOOLS"),
            AgentState::Done => write!(f, "DONE"),
            AgentState::Failed => write!(f, "FAILED"),
        }
    }
}
