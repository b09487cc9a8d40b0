//! Tool Registry - 스키마와 핸들러 바인딩, 검증된 호출 디스패치
//!
//! 두 가지 모드:
//! - **open**: 자유롭게 등록 가능한 테이블
//! - **strict**: 한 번 만들어진 고정 테이블 (`Arc<[_]>`), 세션 간 공유
//!
//! `execute`는 어떤 경우에도 `ToolResult`를 돌려줍니다. 핸들러의 `Err`와
//! panic도 실패 결과로 바뀝니다.

use crate::args::resolve_arguments;
use crate::output::{truncate_diagnostic, MAX_DIAGNOSTIC_LENGTH};
use crate::{Tool, ToolContext};
use forgebox_foundation::{Error, Result, ToolErrorKind, ToolResult, ToolSchema};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
struct RegisteredTool {
    schema: ToolSchema,
    handler: Arc<dyn Tool>,
}

impl RegisteredTool {
    fn new(handler: Arc<dyn Tool>) -> Self {
        Self {
            schema: handler.schema(),
            handler,
        }
    }
}

#[derive(Clone)]
enum ToolTable {
    Open(Vec<RegisteredTool>),
    Strict(Arc<[RegisteredTool]>),
}

impl ToolTable {
    fn entries(&self) -> &[RegisteredTool] {
        match self {
            ToolTable::Open(tools) => tools.as_slice(),
            ToolTable::Strict(tools) => &tools[..],
        }
    }
}

/// Registry of available tools
///
/// Clone은 strict 테이블을 복사하지 않고 `Arc`만 공유합니다.
#[derive(Clone)]
pub struct ToolRegistry {
    table: ToolTable,
}

impl ToolRegistry {
    /// 빈 open 레지스트리
    pub fn open() -> Self {
        Self {
            table: ToolTable::Open(Vec::new()),
        }
    }

    /// 고정 strict 레지스트리
    ///
    /// 이름이 겹치면 `Error::DuplicateTool`.
    pub fn strict(tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
        let mut registry = Self::open();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry.seal())
    }

    /// 내장 도구 테이블로 만든 strict 레지스트리
    pub fn builtin() -> Result<Self> {
        Self::strict(crate::builtin::builtin_tools())
    }

    /// open 테이블을 strict로 고정
    pub fn seal(self) -> Self {
        match self.table {
            ToolTable::Open(tools) => Self {
                table: ToolTable::Strict(tools.into()),
            },
            strict @ ToolTable::Strict(_) => Self { table: strict },
        }
    }

    /// 도구 등록
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let entry = RegisteredTool::new(tool);
        let name = entry.schema.name.clone();

        match &mut self.table {
            ToolTable::Strict(_) => Err(Error::RegistrySealed(name)),
            ToolTable::Open(tools) => {
                if tools.iter().any(|t| t.schema.name == name) {
                    return Err(Error::DuplicateTool(name));
                }
                debug!(tool = %name, "Registered tool");
                tools.push(entry);
                Ok(())
            }
        }
    }

    /// 등록 순서대로 스키마 목록 (LLM에 전달)
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.table
            .entries()
            .iter()
            .map(|t| t.schema.clone())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.table
            .entries()
            .iter()
            .map(|t| t.schema.name.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self.table, ToolTable::Strict(_))
    }

    pub fn len(&self) -> usize {
        self.table.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.entries().is_empty()
    }

    fn find(&self, name: &str) -> Option<&RegisteredTool> {
        self.table.entries().iter().find(|t| t.schema.name == name)
    }

    /// 이름으로 도구 실행
    ///
    /// 순서: 알 수 없는 도구 → 인자 스키마 검사 → 경로/명령어 검증 → 핸들러.
    pub async fn execute(&self, name: &str, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.find(name) else {
            warn!(tool = %name, "Unknown tool requested");
            return ToolResult::error(
                ToolErrorKind::UnknownTool,
                format!("unknown tool '{}'", name),
            )
            .with_message(format!("Available tools: {}", self.names().join(", ")));
        };

        let args = match resolve_arguments(&tool.schema, arguments, ctx.policy()) {
            Ok(args) => args,
            Err(rejected) => {
                debug!(
                    tool = %name,
                    error = rejected.error.as_deref().unwrap_or_default(),
                    "Tool arguments rejected"
                );
                return rejected;
            }
        };

        let handler = Arc::clone(&tool.handler);
        let outcome = AssertUnwindSafe(handler.execute(args, ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => {
                info!(tool = %name, success = result.success, "Tool executed");
                result
            }
            Ok(Err(err)) => {
                warn!(tool = %name, error = %err, "Tool handler returned an error");
                ToolResult::error(
                    failure_kind(&err),
                    truncate_diagnostic(&err.to_string(), MAX_DIAGNOSTIC_LENGTH),
                )
            }
            Err(panic) => {
                let diagnostic = format!("tool '{}' panicked: {}", name, panic_message(&panic));
                warn!(tool = %name, "Tool handler panicked");
                ToolResult::error(
                    ToolErrorKind::HandlerFault,
                    truncate_diagnostic(&diagnostic, MAX_DIAGNOSTIC_LENGTH),
                )
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::open()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("sealed", &self.is_sealed())
            .field("tools", &self.names())
            .finish()
    }
}

fn failure_kind(err: &Error) -> ToolErrorKind {
    match err {
        Error::Validation(_) | Error::WorkspaceBinding(_) => ToolErrorKind::Validation,
        Error::Timeout(_) => ToolErrorKind::Timeout,
        Error::Execution(_) | Error::ToolExecution { .. } | Error::Io(_) => {
            ToolErrorKind::Execution
        }
        _ => ToolErrorKind::HandlerFault,
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
