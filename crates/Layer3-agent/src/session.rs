//! Agent session - 한 대화의 상태
//!
//! 세션끼리는 독립적이며 공유되는 것은 불변 `SandboxPolicy`뿐입니다.

use crate::history::MessageHistory;
use chrono::{DateTime, Utc};
use forgebox_foundation::{SandboxPolicy, SessionBudget};
use std::sync::Arc;
use uuid::Uuid;

/// A conversation session
#[derive(Debug, Clone)]
pub struct AgentSession {
    /// Unique session ID
    pub id: String,

    policy: Arc<SandboxPolicy>,
    claimed_workspace_id: String,

    /// 대화 기록 (append-only)
    pub history: MessageHistory,

    budget: SessionBudget,

    /// 이번 턴에 실행된 도구 호출 수
    pub(crate) tool_call_count: u32,
    /// 연속 실패 수 (성공 시 0)
    pub(crate) consecutive_failures: u32,
    /// 세션 전체 도구 호출 수
    pub(crate) total_tool_calls: u64,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// When the session was last updated
    pub updated_at: DateTime<Utc>,
}

impl AgentSession {
    /// Create a new session
    pub fn new(
        policy: Arc<SandboxPolicy>,
        claimed_workspace_id: impl Into<String>,
        budget: SessionBudget,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            policy,
            claimed_workspace_id: claimed_workspace_id.into(),
            history: MessageHistory::new(),
            budget,
            tool_call_count: 0,
            consecutive_failures: 0,
            total_tool_calls: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a session with a specific ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn policy(&self) -> &Arc<SandboxPolicy> {
        &self.policy
    }

    pub fn claimed_workspace_id(&self) -> &str {
        &self.claimed_workspace_id
    }

    pub fn budget(&self) -> &SessionBudget {
        &self.budget
    }

    pub fn tool_call_count(&self) -> u32 {
        self.tool_call_count
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn total_tool_calls(&self) -> u64 {
        self.total_tool_calls
    }

    /// 새 턴 시작 - 턴 단위 카운터 초기화
    pub(crate) fn begin_turn(&mut self) {
        self.tool_call_count = 0;
        self.consecutive_failures = 0;
        self.touch();
    }

    /// Mark session as updated
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_has_fresh_counters() {
        let policy = Arc::new(SandboxPolicy::new("/workspace/proj", "ws-1").unwrap());
        let session = AgentSession::new(policy, "ws-1", SessionBudget::default());
        assert_eq!(session.tool_call_count(), 0);
        assert_eq!(session.total_tool_calls(), 0);
        assert!(session.history.is_empty());
        assert!(Uuid::parse_str(&session.id).is_ok());
    }
}
