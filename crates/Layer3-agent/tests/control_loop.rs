//! Control loop integration tests
//!
//! 실제 `LocalBackend` + 내장 strict 레지스트리 + `ScriptedClient`로 루프 전체를 돌립니다.

use async_trait::async_trait;
use forgebox_agent::{
    AgentController, AgentEvent, AgentSession, AgentState, CancellationToken, FailureReason,
};
use forgebox_foundation::{
    Message, Result, SandboxPolicy, SessionBudget, ToolCall, ToolResult, ToolSchema,
};
use forgebox_provider::{ModelResponse, ProviderError, RetryConfig, ScriptedClient};
use forgebox_tool::{ExecutionBackend, LocalBackend, Tool, ToolArgs, ToolContext, ToolRegistry};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

// ============================================================================
// Fixtures
// ============================================================================

struct Workspace {
    dir: TempDir,
    policy: Arc<SandboxPolicy>,
    backend: Arc<dyn ExecutionBackend>,
}

fn workspace() -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let policy = Arc::new(SandboxPolicy::new(&root, "ws-1").unwrap());
    let backend: Arc<dyn ExecutionBackend> = Arc::new(LocalBackend::for_policy(&policy));
    Workspace {
        dir,
        policy,
        backend,
    }
}

fn session(ws: &Workspace, budget: SessionBudget) -> AgentSession {
    AgentSession::new(Arc::clone(&ws.policy), "ws-1", budget)
}

fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(id, name, arguments)
}

fn tool_calls(calls: Vec<ToolCall>) -> ModelResponse {
    ModelResponse::with_tool_calls(calls)
}

fn controller(ws: &Workspace, client: &Arc<ScriptedClient>) -> AgentController {
    AgentController::new(
        ToolRegistry::builtin().unwrap(),
        Arc::clone(&ws.backend),
        client.clone(),
    )
    .with_retry_config(RetryConfig {
        initial_delay_ms: 1,
        jitter: false,
        ..Default::default()
    })
}

/// tool 메시지 내용을 JSON으로
fn tool_payloads(session: &AgentSession) -> Vec<Value> {
    session
        .history
        .messages()
        .iter()
        .filter_map(|m| match m {
            Message::Tool { content, .. } => Some(serde_json::from_str(content).unwrap()),
            _ => None,
        })
        .collect()
}

fn roles(session: &AgentSession) -> Vec<String> {
    session
        .history
        .messages()
        .iter()
        .map(|m| m.role().to_string())
        .collect()
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_reads_file_then_finishes() {
    let ws = workspace();
    std::fs::write(ws.dir.path().join("hello.txt"), "hello world").unwrap();

    let client = Arc::new(ScriptedClient::with_responses([
        ModelResponse {
            content: Some("Let me look at the file first.".into()),
            ..tool_calls(vec![call("call_1", "read_file", json!({"path": "hello.txt"}))])
        },
        ModelResponse::text("The file says hello world."),
    ]));
    let mut session = session(&ws, SessionBudget::default());

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "What does hello.txt say?", &CancellationToken::new())
        .await;

    assert!(outcome.success, "{:?}", outcome);
    assert_eq!(outcome.message, "The file says hello world.");
    assert_eq!(outcome.tool_calls_executed, 1);
    assert_eq!(outcome.failure_reason, None);
    assert_eq!(
        roles(&session),
        vec!["system", "user", "assistant", "tool", "assistant"]
    );

    let payloads = tool_payloads(&session);
    assert_eq!(payloads[0]["success"], true);
    assert_eq!(payloads[0]["data"]["content"], "hello world");

    // 두 번째 요청은 도구 결과까지 포함한 전체 히스토리와 스키마를 받는다
    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(requests[1].tools.len(), 6);
}

#[tokio::test]
async fn test_validation_failure_is_reported_to_model() {
    let ws = workspace();
    let client = Arc::new(ScriptedClient::with_responses([
        tool_calls(vec![call(
            "call_1",
            "read_file",
            json!({"path": "../../etc/passwd"}),
        )]),
        ModelResponse::text("I cannot read files outside the workspace."),
    ]));
    let mut session = session(&ws, SessionBudget::default());

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "read /etc/passwd", &CancellationToken::new())
        .await;

    assert!(outcome.success);
    let payloads = tool_payloads(&session);
    assert_eq!(payloads[0]["kind"], "validation");
    assert!(payloads[0]["error"]
        .as_str()
        .unwrap()
        .contains("escapes the sandbox"));
}

#[tokio::test]
async fn test_second_turn_resets_turn_counters() {
    let ws = workspace();
    let client = Arc::new(ScriptedClient::with_responses([
        tool_calls(vec![call("call_1", "list_directory", json!({}))]),
        ModelResponse::text("one"),
        tool_calls(vec![call("call_2", "list_directory", json!({}))]),
        ModelResponse::text("two"),
    ]));
    let controller = controller(&ws, &client);
    let mut session = session(&ws, SessionBudget::default());
    let cancel = CancellationToken::new();

    let first = controller.run_agent(&mut session, "first", &cancel).await;
    let second = controller.run_agent(&mut session, "second", &cancel).await;

    assert_eq!(first.tool_calls_executed, 1);
    assert_eq!(second.tool_calls_executed, 1);
    assert_eq!(session.total_tool_calls(), 2);
    let systems = session
        .history
        .messages()
        .iter()
        .filter(|m| matches!(m, Message::System { .. }))
        .count();
    assert_eq!(systems, 1);
}

// ============================================================================
// Budgets
// ============================================================================

#[tokio::test]
async fn test_sixth_call_never_dispatched() {
    let ws = workspace();
    let calls: Vec<ToolCall> = (1..=6)
        .map(|i| {
            call(
                &format!("call_{}", i),
                "write_file",
                json!({"path": format!("f{}.txt", i), "content": "x"}),
            )
        })
        .collect();
    let client = Arc::new(ScriptedClient::with_responses([tool_calls(calls)]));
    let mut session = session(&ws, SessionBudget::default().with_max_tool_calls(5));

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "write six files", &CancellationToken::new())
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure_reason, Some(FailureReason::BudgetExceeded));
    assert_eq!(outcome.tool_calls_executed, 5);
    assert!(ws.dir.path().join("f5.txt").exists());
    assert!(!ws.dir.path().join("f6.txt").exists());

    // 6번째 호출에는 skipped 결과가 남아 히스토리가 온전하다
    let payloads = tool_payloads(&session);
    assert_eq!(payloads.len(), 6);
    assert_eq!(payloads[5]["kind"], "skipped");
    assert!(session.history.unanswered_tool_calls().is_empty());
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_failure_counter_resets_on_success() {
    let ws = workspace();
    let missing = || json!({"path": "missing.txt"});
    let client = Arc::new(ScriptedClient::with_responses([
        tool_calls(vec![call("c1", "read_file", missing())]),
        tool_calls(vec![call("c2", "read_file", missing())]),
        tool_calls(vec![call("c3", "list_directory", json!({}))]),
        tool_calls(vec![call("c4", "read_file", missing())]),
        tool_calls(vec![call("c5", "read_file", missing())]),
        ModelResponse::text("gave up on missing.txt"),
    ]));
    let mut session = session(&ws, SessionBudget::default().with_max_retries(2));

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "read missing.txt", &CancellationToken::new())
        .await;

    assert!(outcome.success, "{:?}", outcome);
    assert_eq!(outcome.tool_calls_executed, 5);
    assert_eq!(session.consecutive_failures(), 2);
}

#[tokio::test]
async fn test_consecutive_failures_exhaust_retries() {
    let ws = workspace();
    let calls: Vec<ToolCall> = (1..=4)
        .map(|i| call(&format!("c{}", i), "read_file", json!({"path": "missing.txt"})))
        .collect();
    let client = Arc::new(ScriptedClient::with_responses([tool_calls(calls)]));
    let mut session = session(&ws, SessionBudget::default().with_max_retries(2));

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "read missing.txt", &CancellationToken::new())
        .await;

    assert_eq!(outcome.failure_reason, Some(FailureReason::RetriesExhausted));
    assert_eq!(outcome.tool_calls_executed, 3);
    assert!(outcome.message.contains("Not found"), "{}", outcome.message);
    assert_eq!(tool_payloads(&session)[3]["kind"], "skipped");
}

#[tokio::test]
async fn test_iteration_cap() {
    let ws = workspace();
    let client = Arc::new(ScriptedClient::with_responses(
        (1..=3).map(|i| tool_calls(vec![call(&format!("c{}", i), "list_directory", json!({}))])),
    ));
    let mut session = session(&ws, SessionBudget::default().with_max_iterations(2));

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "keep listing", &CancellationToken::new())
        .await;

    assert_eq!(outcome.failure_reason, Some(FailureReason::IterationCap));
    assert_eq!(outcome.tool_calls_executed, 2);
    assert_eq!(client.request_count(), 2);
}

// ============================================================================
// Timeouts and cancellation
// ============================================================================

struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::builder("slow", "Never finishes in time").build()
    }

    async fn execute(&self, _args: ToolArgs, _ctx: &ToolContext) -> Result<ToolResult> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ToolResult::success(json!("finally")))
    }
}

#[tokio::test(start_paused = true)]
async fn test_per_call_timeout_synthesizes_failure() {
    let ws = workspace();
    let client = Arc::new(ScriptedClient::with_responses([
        tool_calls(vec![call("c1", "slow", json!({}))]),
        ModelResponse::text("the tool timed out"),
    ]));
    let registry = ToolRegistry::strict(vec![Arc::new(SlowTool) as Arc<dyn Tool>]).unwrap();
    let controller = AgentController::new(registry, Arc::clone(&ws.backend), client.clone());
    let mut session = session(
        &ws,
        SessionBudget::default().with_per_call_timeout(Duration::from_millis(50)),
    );

    let outcome = controller
        .run_agent(&mut session, "run slow", &CancellationToken::new())
        .await;

    assert!(outcome.success);
    let payloads = tool_payloads(&session);
    assert_eq!(payloads[0]["success"], false);
    assert_eq!(payloads[0]["error"], "timeout");
    assert_eq!(session.consecutive_failures(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wall_clock_ends_slow_model_call() {
    let ws = workspace();
    let client = Arc::new(
        ScriptedClient::with_responses([ModelResponse::text("too late")])
            .with_latency(Duration::from_secs(120)),
    );
    let mut session = session(
        &ws,
        SessionBudget::default().with_max_wall_clock(Duration::from_secs(30)),
    );

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "hello", &CancellationToken::new())
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure_reason, Some(FailureReason::WallClock));
    assert!(outcome.message.contains("wall clock"), "{}", outcome.message);
    assert_eq!(session.history.last_assistant(), None);
}

#[tokio::test(start_paused = true)]
async fn test_wall_clock_skips_rest_of_batch() {
    let ws = workspace();
    let client = Arc::new(ScriptedClient::with_responses([
        tool_calls(vec![
            call("c1", "slow", json!({})),
            call("c2", "slow", json!({})),
            call("c3", "slow", json!({})),
        ]),
        ModelResponse::text("never requested"),
    ]));
    let registry = ToolRegistry::strict(vec![Arc::new(SlowTool) as Arc<dyn Tool>]).unwrap();
    let controller = AgentController::new(registry, Arc::clone(&ws.backend), client.clone());
    let mut session = session(
        &ws,
        SessionBudget::default()
            .with_max_wall_clock(Duration::from_secs(30))
            .with_per_call_timeout(Duration::from_secs(20))
            .with_max_retries(10),
    );

    let outcome = controller
        .run_agent(&mut session, "run slow three times", &CancellationToken::new())
        .await;

    // c1, c2가 각각 20초씩 타임아웃된 뒤 c3 직전에 40초 > 30초
    assert_eq!(outcome.failure_reason, Some(FailureReason::WallClock));
    assert_eq!(outcome.tool_calls_executed, 2);
    let payloads = tool_payloads(&session);
    assert_eq!(payloads.len(), 3);
    assert_eq!(payloads[1]["error"], "timeout");
    assert_eq!(payloads[2]["kind"], "skipped");
    assert!(session.history.unanswered_tool_calls().is_empty());
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let ws = workspace();
    let client = Arc::new(ScriptedClient::with_responses([ModelResponse::text("hi")]));
    let mut session = session(&ws, SessionBudget::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "hello", &cancel)
        .await;

    assert_eq!(outcome.failure_reason, Some(FailureReason::Cancelled));
    assert_eq!(client.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_abandons_inflight_model_call() {
    let ws = workspace();
    let client = Arc::new(
        ScriptedClient::with_responses([ModelResponse::text("too late")])
            .with_latency(Duration::from_secs(60)),
    );
    let mut session = session(&ws, SessionBudget::default());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "hello", &cancel)
        .await;

    assert_eq!(outcome.failure_reason, Some(FailureReason::Cancelled));
    assert_eq!(session.history.last_assistant(), None);
}

/// 실행되면 실행 중인 턴을 취소하는 도구
struct CancellingTool {
    token: CancellationToken,
}

#[async_trait]
impl Tool for CancellingTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::builder("stop_run", "Cancels the running turn").build()
    }

    async fn execute(&self, _args: ToolArgs, _ctx: &ToolContext) -> Result<ToolResult> {
        self.token.cancel();
        Ok(ToolResult::success(json!("stopping")))
    }
}

struct CountingTool {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for CountingTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::builder("count", "Counts invocations").build()
    }

    async fn execute(&self, _args: ToolArgs, _ctx: &ToolContext) -> Result<ToolResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ToolResult::success(json!("counted")))
    }
}

#[tokio::test]
async fn test_cancel_between_calls_skips_rest_of_batch() {
    let ws = workspace();
    let cancel = CancellationToken::new();
    let counted = Arc::new(AtomicUsize::new(0));
    let registry = ToolRegistry::strict(vec![
        Arc::new(CancellingTool {
            token: cancel.clone(),
        }) as Arc<dyn Tool>,
        Arc::new(CountingTool {
            calls: Arc::clone(&counted),
        }),
    ])
    .unwrap();
    let client = Arc::new(ScriptedClient::with_responses([
        tool_calls(vec![
            call("c1", "stop_run", json!({})),
            call("c2", "count", json!({})),
            call("c3", "count", json!({})),
        ]),
        ModelResponse::text("never requested"),
    ]));
    let controller = AgentController::new(registry, Arc::clone(&ws.backend), client.clone());
    let mut session = session(&ws, SessionBudget::default());

    let outcome = controller.run_agent(&mut session, "stop midway", &cancel).await;

    assert_eq!(outcome.failure_reason, Some(FailureReason::Cancelled));
    assert_eq!(outcome.tool_calls_executed, 1);
    assert_eq!(counted.load(Ordering::SeqCst), 0);

    let payloads = tool_payloads(&session);
    assert_eq!(payloads.len(), 3);
    assert_eq!(payloads[0]["success"], true);
    assert_eq!(payloads[1]["kind"], "skipped");
    assert_eq!(payloads[2]["kind"], "skipped");
    assert!(session.history.unanswered_tool_calls().is_empty());
    assert_eq!(client.request_count(), 1);
}

// ============================================================================
// Model client errors
// ============================================================================

#[tokio::test]
async fn test_transient_model_error_retried() {
    let ws = workspace();
    let client = Arc::new(ScriptedClient::new());
    client.push_error(ProviderError::ServerError("503 overloaded".into()));
    client.push_response(ModelResponse::text("recovered"));
    let mut session = session(&ws, SessionBudget::default());

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "hello", &CancellationToken::new())
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.message, "recovered");
    assert_eq!(client.request_count(), 2);
}

#[tokio::test]
async fn test_permanent_model_error_is_terminal() {
    let ws = workspace();
    let client = Arc::new(ScriptedClient::new());
    client.push_error(ProviderError::Authentication("bad key".into()));
    client.push_response(ModelResponse::text("unreachable"));
    let mut session = session(&ws, SessionBudget::default());

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "hello", &CancellationToken::new())
        .await;

    assert_eq!(outcome.failure_reason, Some(FailureReason::ModelClient));
    assert!(outcome.message.contains("bad key"));
    assert_eq!(client.request_count(), 1);
}

// ============================================================================
// Workspace binding and events
// ============================================================================

#[tokio::test]
async fn test_foreign_workspace_rejected() {
    let ws = workspace();
    let client = Arc::new(ScriptedClient::with_responses([ModelResponse::text("hi")]));
    let mut session = AgentSession::new(Arc::clone(&ws.policy), "ws-2", SessionBudget::default());

    let outcome = controller(&ws, &client)
        .run_agent(&mut session, "hello", &CancellationToken::new())
        .await;

    assert_eq!(outcome.failure_reason, Some(FailureReason::WorkspaceBinding));
    assert!(session.history.is_empty());
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn test_events_follow_state_machine() {
    let ws = workspace();
    let client = Arc::new(ScriptedClient::with_responses([
        tool_calls(vec![call("c1", "list_directory", json!({}))]),
        ModelResponse::text("done"),
    ]));
    let (tx, mut rx) = mpsc::channel(64);
    let controller = controller(&ws, &client).with_events(tx);
    let mut session = session(&ws, SessionBudget::default());

    controller
        .run_agent(&mut session, "list", &CancellationToken::new())
        .await;
    drop(controller);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(
        events,
        vec![
            AgentEvent::StateChanged(AgentState::AwaitingModel),
            AgentEvent::StateChanged(AgentState::ExecutingTools),
            AgentEvent::ToolStart {
                tool_name: "list_directory".into(),
                tool_call_id: "c1".into(),
            },
            AgentEvent::ToolComplete {
                tool_name: "list_directory".into(),
                tool_call_id: "c1".into(),
                success: true,
                summary: None,
            },
            AgentEvent::StateChanged(AgentState::AwaitingModel),
            AgentEvent::StateChanged(AgentState::Done),
            AgentEvent::Done {
                message: "done".into(),
            },
        ]
    );
}
