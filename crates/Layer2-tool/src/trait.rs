//! Tool trait - 도구 핸들러 계약

use crate::{ToolArgs, ToolContext};
use async_trait::async_trait;
use forgebox_foundation::{Result, ToolResult, ToolSchema};

/// Tool trait - 새 도구를 만들려면 이것을 구현
///
/// 핸들러는 레지스트리가 검증을 마친 `ToolArgs`만 받습니다. 경로와 명령어는
/// 이미 `SandboxPath`/`SandboxCommand`로 해석되어 있습니다.
///
/// `Err`를 돌려주면 레지스트리가 실패 `ToolResult`로 감쌉니다.
#[async_trait]
pub trait Tool: Send + Sync {
    /// 선언적 스키마
    fn schema(&self) -> ToolSchema;

    /// 도구 실행
    async fn execute(&self, args: ToolArgs, ctx: &ToolContext) -> Result<ToolResult>;

    /// 도구 이름 (편의 메서드)
    fn name(&self) -> String {
        self.schema().name
    }
}
