//! Agent Controller - 도구 호출 대화 루프
//!
//! 한 턴의 흐름:
//! 1. 모델 호출 (전체 히스토리 + 도구 스키마, `tool_choice: auto`)
//! 2. tool_calls가 없으면 `Done`
//! 3. 있으면 순서대로 하나씩 실행 (예산 확인 → 타임아웃 → 결과 기록)
//! 4. 다시 1로
//!
//! 종료 판단은 오직 "tool_calls 없음" 신호로만 합니다.

use crate::events::AgentEvent;
use crate::outcome::{AgentOutcome, FailureReason};
use crate::session::AgentSession;
use crate::state::AgentState;
use forgebox_foundation::{ToolCall, ToolResult};
use forgebox_provider::{with_retry, ModelClient, ModelRequest, ProviderError, RetryConfig};
use forgebox_tool::{ExecutionBackend, ToolContext, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 히스토리가 비어 있을 때 넣는 기본 시스템 메시지
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a coding agent working inside an isolated workspace. \
Use the provided tools to inspect and change files and to run commands. \
All paths are relative to the workspace root. When the task is complete, \
or you need more information from the user, reply without calling any tool.";

/// The agent control loop
///
/// 정책/레지스트리/백엔드/클라이언트는 모두 주입됩니다. 전역 상태는 없습니다.
pub struct AgentController {
    registry: ToolRegistry,
    backend: Arc<dyn ExecutionBackend>,
    client: Arc<dyn ModelClient>,
    system_prompt: String,
    retry: RetryConfig,
    event_tx: Option<mpsc::Sender<AgentEvent>>,
}

impl AgentController {
    pub fn new(
        registry: ToolRegistry,
        backend: Arc<dyn ExecutionBackend>,
        client: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            registry,
            backend,
            client,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            retry: RetryConfig::default(),
            event_tx: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// 모델 호출 재시도 백오프 설정 (횟수는 세션 예산의 `model_retries`)
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 이벤트 채널 연결
    pub fn with_events(mut self, event_tx: mpsc::Sender<AgentEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 사용자 메시지 하나에 대해 루프 실행
    ///
    /// 에러를 돌려주지 않습니다. 모든 종료는 `AgentOutcome`으로 표현됩니다.
    pub async fn run_agent(
        &self,
        session: &mut AgentSession,
        user_message: &str,
        cancel: &CancellationToken,
    ) -> AgentOutcome {
        let started = Instant::now();
        let budget = *session.budget();
        session.begin_turn();

        info!(
            session = %session.id,
            workspace = %session.claimed_workspace_id(),
            model = %self.client.model(),
            "Agent turn started"
        );

        let ctx = match ToolContext::bind(
            Arc::clone(session.policy()),
            Arc::clone(&self.backend),
            session.claimed_workspace_id(),
        ) {
            Ok(ctx) => ctx.with_session_id(session.id.clone()),
            Err(err) => {
                return self
                    .fail(session, FailureReason::WorkspaceBinding, err.to_string())
                    .await
            }
        };

        if session.history.is_empty() {
            session.history.add_system(self.system_prompt.clone());
        }
        session.history.add_user(user_message);

        let schemas = self.registry.list_schemas();
        let retry = self.retry.clone().with_max_retries(budget.model_retries);
        let mut iterations: u32 = 0;

        loop {
            // ================================================================
            // AWAITING_MODEL
            // ================================================================
            if cancel.is_cancelled() {
                return self.cancelled(session).await;
            }
            if iterations >= budget.max_iterations {
                let message = format!("stopped after {} model round trips", iterations);
                return self.fail(session, FailureReason::IterationCap, message).await;
            }
            let Some(remaining) = remaining_wall_clock(started, budget.max_wall_clock) else {
                return self.wall_clock_exceeded(session, budget.max_wall_clock).await;
            };

            iterations += 1;
            self.transition(AgentState::AwaitingModel).await;
            debug!(session = %session.id, iteration = iterations, "Requesting model completion");

            let request = ModelRequest::new(session.history.to_messages(), schemas.clone());
            let client = Arc::clone(&self.client);
            let completion = with_retry(&retry, "model completion", cancel, || {
                client.complete(request.clone())
            });

            let response = match tokio::time::timeout(remaining, completion).await {
                Err(_) => return self.wall_clock_exceeded(session, budget.max_wall_clock).await,
                Ok(Err(ProviderError::Cancelled)) => return self.cancelled(session).await,
                Ok(Err(err)) => {
                    return self
                        .fail(session, FailureReason::ModelClient, err.to_string())
                        .await
                }
                Ok(Ok(response)) => response,
            };

            if !response.has_tool_calls() {
                let message = response.content.unwrap_or_default();
                session.history.add_assistant(message.clone());
                session.touch();

                self.transition(AgentState::Done).await;
                self.emit(AgentEvent::Done {
                    message: message.clone(),
                })
                .await;
                info!(
                    session = %session.id,
                    tool_calls = session.tool_call_count,
                    iterations,
                    "Agent turn completed"
                );
                return AgentOutcome::done(message, session.tool_call_count);
            }

            // ================================================================
            // EXECUTING_TOOLS
            // ================================================================
            let calls = response.tool_calls;
            session
                .history
                .add_assistant_with_tools(response.content, calls.clone());
            self.transition(AgentState::ExecutingTools).await;

            for (index, call) in calls.iter().enumerate() {
                let stop = if cancel.is_cancelled() {
                    Some((FailureReason::Cancelled, "cancelled by caller".to_string()))
                } else if started.elapsed() >= budget.max_wall_clock {
                    Some((
                        FailureReason::WallClock,
                        wall_clock_message(budget.max_wall_clock),
                    ))
                } else if session.tool_call_count >= budget.max_tool_calls {
                    Some((
                        FailureReason::BudgetExceeded,
                        format!(
                            "tool call budget of {} exhausted; {} calls executed",
                            budget.max_tool_calls, session.tool_call_count
                        ),
                    ))
                } else {
                    None
                };

                if let Some((reason, message)) = stop {
                    self.skip_remaining(session, &calls[index..], reason).await;
                    return self.fail(session, reason, message).await;
                }

                session.tool_call_count += 1;
                session.total_tool_calls += 1;

                let result = self.dispatch(call, &ctx, budget.per_call_timeout).await;
                session.history.add_tool_result(call.id.clone(), &result);

                if result.success {
                    session.consecutive_failures = 0;
                    continue;
                }

                session.consecutive_failures += 1;
                if session.consecutive_failures > budget.max_retries {
                    self.skip_remaining(session, &calls[index + 1..], FailureReason::RetriesExhausted)
                        .await;
                    let message = result.failure_summary();
                    return self
                        .fail(session, FailureReason::RetriesExhausted, message)
                        .await;
                }
            }

            session.touch();
        }
    }

    /// 도구 하나 실행 (호출 단위 타임아웃)
    async fn dispatch(&self, call: &ToolCall, ctx: &ToolContext, timeout: Duration) -> ToolResult {
        self.emit(AgentEvent::ToolStart {
            tool_name: call.name.clone(),
            tool_call_id: call.id.clone(),
        })
        .await;
        debug!(tool = %call.name, call_id = %call.id, "Dispatching tool call");

        let execution = self
            .registry
            .execute(&call.name, call.arguments.clone(), ctx);
        let result = match tokio::time::timeout(timeout, execution).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %call.name, call_id = %call.id, ?timeout, "Tool call timed out");
                ToolResult::timeout()
            }
        };

        self.emit(AgentEvent::ToolComplete {
            tool_name: call.name.clone(),
            tool_call_id: call.id.clone(),
            success: result.success,
            summary: (!result.success).then(|| result.failure_summary()),
        })
        .await;

        result
    }

    /// 중단된 배치의 남은 호출에 `skipped` 결과를 남겨 히스토리를 온전하게 유지
    async fn skip_remaining(
        &self,
        session: &mut AgentSession,
        calls: &[ToolCall],
        reason: FailureReason,
    ) {
        for call in calls {
            session
                .history
                .add_tool_result(call.id.clone(), &ToolResult::skipped(reason.to_string()));
            self.emit(AgentEvent::ToolSkipped {
                tool_call_id: call.id.clone(),
            })
            .await;
        }
    }

    async fn cancelled(&self, session: &mut AgentSession) -> AgentOutcome {
        self.fail(session, FailureReason::Cancelled, "cancelled by caller".to_string())
            .await
    }

    async fn wall_clock_exceeded(&self, session: &mut AgentSession, limit: Duration) -> AgentOutcome {
        self.fail(session, FailureReason::WallClock, wall_clock_message(limit))
            .await
    }

    async fn fail(
        &self,
        session: &mut AgentSession,
        reason: FailureReason,
        message: String,
    ) -> AgentOutcome {
        session.touch();
        warn!(
            session = %session.id,
            %reason,
            tool_calls = session.tool_call_count,
            "Agent turn failed: {}",
            message
        );

        self.transition(AgentState::Failed).await;
        self.emit(AgentEvent::Failed {
            reason,
            message: message.clone(),
        })
        .await;

        AgentOutcome::failed(reason, message, session.tool_call_count)
    }

    async fn transition(&self, state: AgentState) {
        self.emit(AgentEvent::StateChanged(state)).await;
    }

    async fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

fn remaining_wall_clock(started: Instant, limit: Duration) -> Option<Duration> {
    limit
        .checked_sub(started.elapsed())
        .filter(|remaining| !remaining.is_zero())
}

fn wall_clock_message(limit: Duration) -> String {
    format!("wall clock budget of {:?} exceeded", limit)
}
