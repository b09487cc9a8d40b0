//! Config - 통합 설정 관리
//!
//! - `limits.rs` - 에이전트 루프 예산
//! - `forgebox.rs` - ForgeboxConfig 통합 설정 (sandbox / limits / provider)

mod forgebox;
mod limits;

pub use forgebox::{ForgeboxConfig, ProviderSettings, SandboxSettings, CONFIG_FILE};
pub use limits::{
    LimitsConfig, SessionBudget, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_TOOL_CALLS, DEFAULT_MAX_WALL_CLOCK_SECS, DEFAULT_MODEL_RETRIES,
    DEFAULT_PER_CALL_TIMEOUT_SECS,
};
