//! Tool Context - 핸들러에 전달되는 세션 바인딩
//!
//! 컨텍스트는 워크스페이스 바인딩 검증을 통과해야만 만들어집니다.

use crate::backend::{BackendOutput, ExecutionBackend, Operation};
use forgebox_foundation::{Error, Result, SandboxPolicy};
use std::sync::Arc;
use tracing::{debug, warn};

/// 도구 실행 컨텍스트
#[derive(Clone)]
pub struct ToolContext {
    policy: Arc<SandboxPolicy>,
    backend: Arc<dyn ExecutionBackend>,
    workspace_id: String,
    session_id: Option<String>,
}

impl ToolContext {
    /// 정책/백엔드/워크스페이스를 바인딩
    ///
    /// 주장된 워크스페이스가 정책에 바인딩된 것과 다르면 `Error::WorkspaceBinding`.
    pub fn bind(
        policy: Arc<SandboxPolicy>,
        backend: Arc<dyn ExecutionBackend>,
        claimed_workspace_id: impl Into<String>,
    ) -> Result<Self> {
        let workspace_id = claimed_workspace_id.into();
        let binding = policy.validate_workspace_binding(&workspace_id);
        if !binding.is_valid {
            return Err(Error::WorkspaceBinding(binding.describe()));
        }

        Ok(Self {
            policy,
            backend,
            workspace_id,
            session_id: None,
        })
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 바인딩된 워크스페이스에서 작업 수행
    ///
    /// 멱등 작업(read/list)만 일시적 실패 시 한 번 재시도합니다.
    pub async fn perform(&self, operation: Operation) -> Result<BackendOutput> {
        let retry_op = operation.is_idempotent().then(|| operation.clone());
        let kind = operation.kind();

        match self.backend.execute(&self.workspace_id, operation).await {
            Ok(output) => Ok(output),
            Err(err) if err.is_transient() => match retry_op {
                Some(op) => {
                    warn!(op = kind, error = %err, "Transient backend failure, retrying once");
                    self.backend
                        .execute(&self.workspace_id, op)
                        .await
                        .map_err(Error::from)
                }
                None => Err(err.into()),
            },
            Err(err) => {
                debug!(op = kind, error = %err, "Backend operation failed");
                Err(err.into())
            }
        }
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("root", &self.policy.sandbox_root())
            .field("workspace_id", &self.workspace_id)
            .field("backend", &self.backend.name())
            .field("session_id", &self.session_id)
            .finish()
    }
}
