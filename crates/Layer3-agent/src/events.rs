//! Agent events - 실행 중 관찰용 이벤트

use crate::outcome::FailureReason;
use crate::state::AgentState;

/// Events emitted by the controller during a run
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// 상태 전이
    StateChanged(AgentState),

    /// Tool execution started
    ToolStart {
        tool_name: String,
        tool_call_id: String,
    },

    /// Tool execution completed
    ToolComplete {
        tool_name: String,
        tool_call_id: String,
        success: bool,
        /// 실패 시 `error: message` 요약
        summary: Option<String>,
    },

    /// 실행되지 않은 호출
    ToolSkipped { tool_call_id: String },

    /// Response completed
    Done { message: String },

    /// 실패로 종료
    Failed {
        reason: FailureReason,
        message: String,
    },
}
