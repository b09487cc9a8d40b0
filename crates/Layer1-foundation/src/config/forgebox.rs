//! ForgeBox Config - 통합 설정
//!
//! `forgebox.json` 하나에 sandbox / limits / provider 섹션을 둡니다.
//! 글로벌(`~/.config/forgebox/`) 설정 위에 프로젝트(`.forgebox/`) 설정을 병합하고,
//! 마지막으로 CLI 플래그가 덮어씁니다.

use crate::security::{PatternSpec, SandboxPolicy};
use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::LimitsConfig;

/// 설정 파일명
pub const CONFIG_FILE: &str = "forgebox.json";

// ============================================================================
// ForgeBox Config (통합)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeboxConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub sandbox: SandboxSettings,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub provider: ProviderSettings,
}

impl ForgeboxConfig {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            ..Default::default()
        }
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self> {
        let global = JsonStore::global().ok();
        let project = JsonStore::project(project_root);
        Self::load_from(global.as_ref(), &project)
    }

    /// 지정된 저장소들에서 병합 로드 (project가 우선)
    pub fn load_from(global: Option<&JsonStore>, project: &JsonStore) -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Some(global) = global {
            if let Some(global_config) = global.load_optional::<ForgeboxConfig>(CONFIG_FILE)? {
                tracing::debug!(path = %global.file_path(CONFIG_FILE).display(), "Loaded global config");
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Some(project_config) = project.load_optional::<ForgeboxConfig>(CONFIG_FILE)? {
            tracing::debug!(path = %project.file_path(CONFIG_FILE).display(), "Loaded project config");
            config.merge(project_config);
        }

        Ok(config)
    }

    /// 프로젝트 설정 저장
    pub fn save_project(&self, project_root: impl AsRef<Path>) -> Result<()> {
        JsonStore::project(project_root).save(CONFIG_FILE, self)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: ForgeboxConfig) {
        self.version = self.version.max(other.version);
        self.sandbox.merge(other.sandbox);
        self.limits.merge(other.limits);
        self.provider.merge(other.provider);
    }
}

// ============================================================================
// Sandbox Settings
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxSettings {
    /// 샌드박스 루트 (절대 경로)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// 세션이 사용할 워크스페이스 id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,

    /// 추가 경로 denylist
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny_paths: Vec<PatternSpec>,

    /// 추가 명령어 denylist
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny_commands: Vec<PatternSpec>,

    /// 컨테이너 백엔드 사용 시 대상 컨테이너 이름
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    /// 컨테이너 런타임 (docker, podman)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_runtime: Option<String>,
}

impl SandboxSettings {
    fn merge(&mut self, other: SandboxSettings) {
        if other.root.is_some() {
            self.root = other.root;
        }
        if other.workspace_id.is_some() {
            self.workspace_id = other.workspace_id;
        }
        if other.container.is_some() {
            self.container = other.container;
        }
        if other.container_runtime.is_some() {
            self.container_runtime = other.container_runtime;
        }
        // denylist는 누적
        self.deny_paths.extend(other.deny_paths);
        self.deny_commands.extend(other.deny_commands);
    }

    /// 설정으로부터 정책 생성 (기본 denylist + 추가 패턴)
    pub fn build_policy(&self) -> Result<SandboxPolicy> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| Error::Config("sandbox.root is not configured".to_string()))?;
        let workspace_id = self
            .workspace_id
            .as_ref()
            .ok_or_else(|| Error::Config("sandbox.workspaceId is not configured".to_string()))?;

        SandboxPolicy::builder(root, workspace_id.clone())
            .deny_paths(self.deny_paths.iter().cloned())
            .deny_commands(self.deny_commands.iter().cloned())
            .build()
    }
}

// ============================================================================
// Provider Settings
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    /// OpenAI 호환 API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API 키를 읽을 환경 변수 이름 (키 자체는 저장하지 않음)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl ProviderSettings {
    fn merge(&mut self, other: ProviderSettings) {
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.api_key_env.is_some() {
            self.api_key_env = other.api_key_env;
        }
    }
}

fn default_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_overrides_global() {
        let global_dir = tempdir().unwrap();
        let project_dir = tempdir().unwrap();
        let global = JsonStore::new(global_dir.path());
        let project = JsonStore::project(project_dir.path());

        let mut g = ForgeboxConfig::new();
        g.limits.max_tool_calls = Some(40);
        g.limits.max_retries = Some(4);
        g.provider.model = Some("gpt-4o-mini".into());
        g.sandbox.deny_commands = vec![PatternSpec::contains("terraform destroy", "infra")];
        global.save(CONFIG_FILE, &g).unwrap();

        let mut p = ForgeboxConfig::new();
        p.limits.max_tool_calls = Some(8);
        p.sandbox.workspace_id = Some("ws-7".into());
        p.sandbox.deny_commands = vec![PatternSpec::contains("kubectl delete", "cluster")];
        project.save(CONFIG_FILE, &p).unwrap();

        let merged = ForgeboxConfig::load_from(Some(&global), &project).unwrap();
        assert_eq!(merged.limits.max_tool_calls, Some(8));
        assert_eq!(merged.limits.max_retries, Some(4));
        assert_eq!(merged.provider.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(merged.sandbox.workspace_id.as_deref(), Some("ws-7"));
        assert_eq!(merged.sandbox.deny_commands.len(), 2);
    }

    #[test]
    fn test_missing_files_yield_defaults() {
        let project_dir = tempdir().unwrap();
        let project = JsonStore::project(project_dir.path());
        let config = ForgeboxConfig::load_from(None, &project).unwrap();
        assert_eq!(config, ForgeboxConfig::new());
    }

    #[test]
    fn test_build_policy_with_extra_patterns() {
        let settings = SandboxSettings {
            root: Some(PathBuf::from("/workspace/proj")),
            workspace_id: Some("ws-1".into()),
            deny_commands: vec![PatternSpec::contains("terraform destroy", "infra")],
            ..Default::default()
        };

        let policy = settings.build_policy().unwrap();
        assert!(!policy.validate_command("terraform destroy -auto-approve").is_valid);
        assert!(policy.validate_command("terraform plan").is_valid);
    }

    #[test]
    fn test_build_policy_requires_root() {
        let settings = SandboxSettings {
            workspace_id: Some("ws-1".into()),
            ..Default::default()
        };
        assert!(matches!(settings.build_policy(), Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_config_file() {
        let raw = r#"{
            "sandbox": {
                "root": "/workspace/proj",
                "workspaceId": "ws-1",
                "denyPaths": [{ "kind": "glob", "pattern": "*.sqlite", "reason": "Database" }]
            },
            "limits": { "maxToolCalls": 5, "maxRetries": 2 }
        }"#;
        let config: ForgeboxConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.sandbox.deny_paths[0].kind, crate::security::PatternKind::Glob);
        assert_eq!(config.limits.resolve().max_tool_calls, 5);

        let policy = config.sandbox.build_policy().unwrap();
        assert!(!policy.validate_path("data/app.sqlite").is_valid);
    }
}
