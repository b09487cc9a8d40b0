//! Security Module - 샌드박스 보안 정책 및 검증
//!
//! ```text
//! SandboxPolicy (불변, Arc 공유)
//!   ├── sandbox_root
//!   ├── authorized_workspace_id
//!   ├── path_denylist    ── glob (/etc, .ssh, *.pem, .forgebox ...)
//!   └── command_denylist ── regex (sudo, curl | sh, rm -rf / ...)
//!
//! validate_path / validate_command / validate_workspace_binding
//!   └── ValidationResult → SandboxPath / SandboxCommand
//! ```

pub mod patterns;
pub mod policy;
pub mod validator;

pub use patterns::{
    default_command_denylist, default_path_denylist, DenyPattern, PatternKind, PatternSpec,
};
pub use policy::{SandboxPolicy, SandboxPolicyBuilder};
pub use validator::{
    validate_command, validate_path, validate_workspace_binding, SandboxCommand, SandboxPath,
    ValidationResult,
};

impl SandboxPolicy {
    /// `validate_path(raw, self)`
    pub fn validate_path(&self, raw: &str) -> ValidationResult {
        validator::validate_path(raw, self)
    }

    /// `validate_command(raw, self)`
    pub fn validate_command(&self, raw: &str) -> ValidationResult {
        validator::validate_command(raw, self)
    }

    /// `validate_workspace_binding(self, claimed)`
    pub fn validate_workspace_binding(&self, claimed_workspace_id: &str) -> ValidationResult {
        validator::validate_workspace_binding(self, claimed_workspace_id)
    }
}
