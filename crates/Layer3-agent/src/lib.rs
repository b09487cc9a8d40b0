//! # forgebox-agent
//!
//! ForgeBox의 도구 호출 제어 루프입니다.
//!
//! ## 핵심 원칙
//!
//! 1. **Simple is Better** - 단순한 while(tool_call) loop
//! 2. **Sequential Tools** - 한 번에 하나의 도구 호출, 순서대로
//! 3. **Flat History** - append-only MessageHistory
//! 4. **Budgets** - 도구 호출 수, 연속 실패, 왕복 횟수, 실행 시간 모두 제한
//!
//! ## 사용 예
//!
//! ```ignore
//! use forgebox_agent::{AgentController, AgentSession};
//!
//! let controller = AgentController::new(registry, backend, client);
//! let mut session = AgentSession::new(policy, "ws-1", budget);
//! let outcome = controller
//!     .run_agent(&mut session, "Fix the failing test", &CancellationToken::new())
//!     .await;
//! ```

pub mod controller;
pub mod events;
pub mod history;
pub mod outcome;
pub mod session;
pub mod state;

pub use controller::{AgentController, DEFAULT_SYSTEM_PROMPT};
pub use events::AgentEvent;
pub use history::MessageHistory;
pub use outcome::{AgentOutcome, FailureReason};
pub use session::AgentSession;
pub use state::AgentState;

// Re-export
pub use tokio_util::sync::CancellationToken;
