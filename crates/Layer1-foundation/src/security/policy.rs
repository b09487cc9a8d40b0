//! Sandbox Policy - 세션에 바인딩되는 불변 보안 정책
//!
//! 정책은 생성 후 변경되지 않으며 `Arc`로 세션 간 공유됩니다.

use super::patterns::{default_command_denylist, default_path_denylist, DenyPattern, PatternSpec};
use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// 샌드박스 정책
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    sandbox_root: PathBuf,
    authorized_workspace_id: String,
    path_denylist: Vec<DenyPattern>,
    command_denylist: Vec<DenyPattern>,
}

impl SandboxPolicy {
    /// 기본 denylist로 정책 생성
    pub fn new(sandbox_root: impl AsRef<Path>, workspace_id: impl Into<String>) -> Result<Self> {
        Self::builder(sandbox_root, workspace_id).build()
    }

    pub fn builder(
        sandbox_root: impl AsRef<Path>,
        workspace_id: impl Into<String>,
    ) -> SandboxPolicyBuilder {
        SandboxPolicyBuilder::new(sandbox_root, workspace_id)
    }

    /// 절대, 정규화된, 후행 구분자 없는 루트
    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    pub fn authorized_workspace_id(&self) -> &str {
        &self.authorized_workspace_id
    }

    pub fn path_denylist(&self) -> &[DenyPattern] {
        &self.path_denylist
    }

    pub fn command_denylist(&self) -> &[DenyPattern] {
        &self.command_denylist
    }

    /// 경로를 거부하는 첫 번째 denylist 패턴
    ///
    /// `relative`는 샌드박스 루트 기준 경로. 실행 백엔드가 실제(심볼릭 링크를
    /// 따라간) 경로를 다시 확인할 때도 이 함수를 씁니다.
    pub fn denied_path(&self, absolute: &Path, relative: &Path) -> Option<&DenyPattern> {
        self.path_denylist
            .iter()
            .find(|p| p.matches_path(absolute, relative))
    }
}

/// SandboxPolicy 빌더
#[derive(Debug, Clone)]
pub struct SandboxPolicyBuilder {
    sandbox_root: PathBuf,
    workspace_id: String,
    path_patterns: Vec<PatternSpec>,
    command_patterns: Vec<PatternSpec>,
}

impl SandboxPolicyBuilder {
    pub fn new(sandbox_root: impl AsRef<Path>, workspace_id: impl Into<String>) -> Self {
        Self {
            sandbox_root: sandbox_root.as_ref().to_path_buf(),
            workspace_id: workspace_id.into(),
            path_patterns: default_path_denylist(),
            command_patterns: default_command_denylist(),
        }
    }

    /// 추가 경로 패턴
    pub fn deny_path(mut self, spec: PatternSpec) -> Self {
        self.path_patterns.push(spec);
        self
    }

    /// 추가 명령어 패턴
    pub fn deny_command(mut self, spec: PatternSpec) -> Self {
        self.command_patterns.push(spec);
        self
    }

    pub fn deny_paths(mut self, specs: impl IntoIterator<Item = PatternSpec>) -> Self {
        self.path_patterns.extend(specs);
        self
    }

    pub fn deny_commands(mut self, specs: impl IntoIterator<Item = PatternSpec>) -> Self {
        self.command_patterns.extend(specs);
        self
    }

    /// 기본 denylist 제거 (테스트/특수 환경용)
    pub fn without_defaults(mut self) -> Self {
        self.path_patterns.clear();
        self.command_patterns.clear();
        self
    }

    pub fn build(self) -> Result<SandboxPolicy> {
        let sandbox_root = canonical_root(&self.sandbox_root)?;

        let workspace_id = self.workspace_id.trim().to_string();
        if workspace_id.is_empty() {
            return Err(Error::Config(
                "authorized workspace id must not be empty".to_string(),
            ));
        }

        let path_denylist = self
            .path_patterns
            .iter()
            .map(PatternSpec::compile)
            .collect::<Result<Vec<_>>>()?;
        let command_denylist = self
            .command_patterns
            .iter()
            .map(PatternSpec::compile)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            root = %sandbox_root.display(),
            workspace = %workspace_id,
            path_patterns = path_denylist.len(),
            command_patterns = command_denylist.len(),
            "Sandbox policy built"
        );

        Ok(SandboxPolicy {
            sandbox_root,
            authorized_workspace_id: workspace_id,
            path_denylist,
            command_denylist,
        })
    }
}

/// 루트 경로를 검증하고 어휘적으로 정규화
fn canonical_root(root: &Path) -> Result<PathBuf> {
    if !root.is_absolute() {
        return Err(Error::Config(format!(
            "sandbox root must be absolute: {}",
            root.display()
        )));
    }

    let mut canonical = PathBuf::new();
    for component in root.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::Config(format!(
                    "sandbox root must not contain '..': {}",
                    root.display()
                )))
            }
            other => canonical.push(other.as_os_str()),
        }
    }
    Ok(canonical)
}

/// 어휘적 정규화 (`.`과 중복 구분자 제거). `..`이 있으면 None.
pub(crate) fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => return None,
            other => normalized.push(other.as_os_str()),
        }
    }
    Some(normalized)
}
