//! Local Backend - 호스트 디렉토리를 워크스페이스로 사용
//!
//! 검증은 어휘적으로만 이루어지므로, I/O 직전에 실제 경로를 다시 확인해
//! 심볼릭 링크로 샌드박스 밖이나 denylist 경로를 가리키는 경우를 차단합니다.
//! 목록 결과에서도 denylist 항목과 `.git` 내부는 빠집니다.

use super::{BackendError, BackendOutput, CommandOutput, DirEntry, ExecutionBackend, Operation};
use async_trait::async_trait;
use forgebox_foundation::{SandboxPath, SandboxPolicy};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// 읽기 최대 크기 (1MB)
const DEFAULT_MAX_READ_BYTES: u64 = 1024 * 1024;

/// 목록 최대 항목 수
const DEFAULT_MAX_ENTRIES: usize = 1000;

/// 재귀 목록에서 내려가지 않는 디렉토리
const SKIPPED_DIR: &str = ".git";

/// 호스트 디렉토리 백엔드
///
/// 루트와 워크스페이스 ID는 정책에서 가져옵니다.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    policy: Arc<SandboxPolicy>,
    max_read_bytes: u64,
    max_entries: usize,
}

/// I/O 직전에 확인한 실제 경로
struct RealPath {
    path: PathBuf,
    /// canonicalize된 루트 기준 경로
    relative: PathBuf,
}

impl LocalBackend {
    pub fn new(policy: Arc<SandboxPolicy>) -> Self {
        Self {
            policy,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn for_policy(policy: &SandboxPolicy) -> Self {
        Self::new(Arc::new(policy.clone()))
    }

    pub fn with_max_read_bytes(mut self, max: u64) -> Self {
        self.max_read_bytes = max;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    fn check_workspace(&self, workspace_id: &str) -> Result<(), BackendError> {
        let expected = self.policy.authorized_workspace_id();
        if workspace_id != expected {
            return Err(BackendError::WorkspaceMismatch {
                expected: expected.to_string(),
                actual: workspace_id.to_string(),
            });
        }
        Ok(())
    }

    /// 실제 파일시스템 경로 확인 (심볼릭 링크 탈출 차단)
    ///
    /// 존재하는 가장 깊은 조상을 canonicalize해서 루트 안에 있는지 본 뒤
    /// 아직 없는 나머지 컴포넌트를 다시 붙이고, 그 결과를 경로 denylist로
    /// 다시 검사합니다.
    async fn resolve_real(&self, path: &SandboxPath) -> Result<RealPath, BackendError> {
        let target = path.absolute();
        let shown = path.display_relative();
        let root = self.policy.sandbox_root();

        if !target.starts_with(root) {
            return Err(BackendError::Escape(shown));
        }

        let real_root = tokio::fs::canonicalize(root).await.map_err(|e| {
            BackendError::Unavailable(format!("sandbox root {}: {}", root.display(), e))
        })?;

        let mut existing = target.to_path_buf();
        let mut missing = Vec::new();
        while tokio::fs::symlink_metadata(&existing).await.is_err() {
            match existing.file_name() {
                Some(name) => {
                    missing.push(name.to_os_string());
                    existing.pop();
                }
                None => break,
            }
        }

        let mut real = tokio::fs::canonicalize(&existing)
            .await
            .map_err(|e| BackendError::from_io(e, &shown))?;

        if !real.starts_with(&real_root) {
            debug!(path = %shown, real = %real.display(), "Symlink escape blocked");
            return Err(BackendError::Escape(shown));
        }

        for name in missing.iter().rev() {
            real.push(name);
        }

        let relative = real
            .strip_prefix(&real_root)
            .map(Path::to_path_buf)
            .map_err(|_| BackendError::Escape(shown.clone()))?;
        if let Some(pattern) = self.policy.denied_path(&real, &relative) {
            debug!(
                path = %shown,
                real = %real.display(),
                pattern = pattern.source(),
                "Denied target blocked"
            );
            return Err(BackendError::Denied {
                path: shown,
                reason: pattern.reason().to_string(),
            });
        }

        Ok(RealPath {
            path: real,
            relative,
        })
    }

    async fn read(&self, path: &SandboxPath) -> Result<BackendOutput, BackendError> {
        let shown = path.display_relative();
        let real = self.resolve_real(path).await?;

        let meta = tokio::fs::metadata(&real.path)
            .await
            .map_err(|e| BackendError::from_io(e, &shown))?;
        if meta.is_dir() {
            return Err(BackendError::InvalidTarget(format!(
                "{} is a directory",
                shown
            )));
        }
        if meta.len() > self.max_read_bytes {
            return Err(BackendError::InvalidTarget(format!(
                "{} is too large ({} bytes, max {})",
                shown,
                meta.len(),
                self.max_read_bytes
            )));
        }

        let bytes = tokio::fs::read(&real.path)
            .await
            .map_err(|e| BackendError::from_io(e, &shown))?;
        Ok(BackendOutput::Content(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    }

    async fn write(&self, path: &SandboxPath, content: &str) -> Result<BackendOutput, BackendError> {
        let shown = path.display_relative();
        let real = self.resolve_real(path).await?;

        if tokio::fs::metadata(&real.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(BackendError::InvalidTarget(format!(
                "{} is a directory",
                shown
            )));
        }

        if let Some(parent) = real.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::from_io(e, &shown))?;
        }
        tokio::fs::write(&real.path, content)
            .await
            .map_err(|e| BackendError::from_io(e, &shown))?;

        Ok(BackendOutput::Written {
            bytes: content.len(),
        })
    }

    async fn list(&self, path: &SandboxPath, recursive: bool) -> Result<BackendOutput, BackendError> {
        let shown = path.display_relative();
        let real = self.resolve_real(path).await?;

        let meta = tokio::fs::metadata(&real.path)
            .await
            .map_err(|e| BackendError::from_io(e, &shown))?;
        if !meta.is_dir() {
            return Err(BackendError::InvalidTarget(format!(
                "{} is not a directory",
                shown
            )));
        }

        let max_entries = self.max_entries;
        let mut entries = if recursive {
            let policy = Arc::clone(&self.policy);
            tokio::task::spawn_blocking(move || walk_recursive(policy, real, max_entries))
                .await
                .map_err(|e| BackendError::Io(format!("directory walk failed: {}", e)))?
        } else {
            list_shallow(&self.policy, &real, max_entries, &shown).await?
        };

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(BackendOutput::Entries(entries))
    }

    async fn delete(&self, path: &SandboxPath) -> Result<BackendOutput, BackendError> {
        let shown = path.display_relative();
        if path.is_root() {
            return Err(BackendError::InvalidTarget(
                "cannot delete the sandbox root".to_string(),
            ));
        }
        let real = self.resolve_real(path).await?;

        let meta = tokio::fs::metadata(&real.path)
            .await
            .map_err(|e| BackendError::from_io(e, &shown))?;
        if meta.is_dir() {
            return Err(BackendError::InvalidTarget(format!(
                "{} is a directory",
                shown
            )));
        }

        tokio::fs::remove_file(&real.path)
            .await
            .map_err(|e| BackendError::from_io(e, &shown))?;
        Ok(BackendOutput::Deleted)
    }

    async fn run(
        &self,
        command: &str,
        cwd: &SandboxPath,
        timeout: Duration,
    ) -> Result<BackendOutput, BackendError> {
        let real_cwd = self.resolve_real(cwd).await?.path;

        let (shell, shell_arg) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let child = Command::new(shell)
            .arg(shell_arg)
            .arg(command)
            .current_dir(&real_cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(BackendError::Io(format!(
                    "failed to spawn '{}': {}",
                    command, e
                )))
            }
            Err(_) => return Err(BackendError::Timeout(timeout)),
        };

        Ok(BackendOutput::Command(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }))
    }
}

async fn list_shallow(
    policy: &SandboxPolicy,
    dir: &RealPath,
    max_entries: usize,
    shown: &str,
) -> Result<Vec<DirEntry>, BackendError> {
    let mut reader = tokio::fs::read_dir(&dir.path)
        .await
        .map_err(|e| BackendError::from_io(e, shown))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| BackendError::from_io(e, shown))?
    {
        if entries.len() >= max_entries {
            break;
        }
        let name = entry.file_name();
        if policy
            .denied_path(&entry.path(), &dir.relative.join(&name))
            .is_some()
        {
            continue;
        }
        let meta = entry.metadata().await.ok();
        let is_dir = meta.as_ref().map(|m| m.is_dir()).unwrap_or(false);
        entries.push(DirEntry {
            path: name.to_string_lossy().into_owned(),
            is_dir,
            size: meta.filter(|m| m.is_file()).map(|m| m.len()),
        });
    }
    Ok(entries)
}

fn walk_recursive(policy: Arc<SandboxPolicy>, dir: RealPath, max_entries: usize) -> Vec<DirEntry> {
    let base = dir.path.clone();
    let base_relative = dir.relative.clone();

    // .gitignore 존중, 숨김 파일 포함, 심볼릭 링크는 따라가지 않음
    let walker = WalkBuilder::new(&dir.path)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .follow_links(false)
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            if entry.file_name() == SKIPPED_DIR {
                return false;
            }
            match entry.path().strip_prefix(&base) {
                Ok(rel) => policy
                    .denied_path(entry.path(), &base_relative.join(rel))
                    .is_none(),
                Err(_) => false,
            }
        })
        .build();

    let mut entries = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if entry.depth() == 0 {
            continue;
        }
        if entries.len() >= max_entries {
            break;
        }

        let relative = match entry.path().strip_prefix(&dir.path) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        let meta = entry.metadata().ok();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        entries.push(DirEntry {
            path: relative,
            is_dir,
            size: meta.filter(|m| m.is_file()).map(|m| m.len()),
        });
    }
    entries
}

#[async_trait]
impl ExecutionBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn execute(
        &self,
        workspace_id: &str,
        operation: Operation,
    ) -> Result<BackendOutput, BackendError> {
        self.check_workspace(workspace_id)?;
        debug!(backend = "local", op = operation.kind(), "Executing operation");

        match operation {
            Operation::Read { path } => self.read(&path).await,
            Operation::Write { path, content } => self.write(&path, &content).await,
            Operation::List { path, recursive } => self.list(&path, recursive).await,
            Operation::Delete { path } => self.delete(&path).await,
            Operation::Run {
                command,
                cwd,
                timeout,
            } => self.run(command.as_str(), &cwd, timeout).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SandboxPolicy, LocalBackend) {
        let dir = tempfile::tempdir().unwrap();
        let policy = SandboxPolicy::new(dir.path(), "ws-local").unwrap();
        let backend = LocalBackend::for_policy(&policy);
        (dir, policy, backend)
    }

    fn path(policy: &SandboxPolicy, raw: &str) -> SandboxPath {
        policy.validate_path(raw).into_sandbox_path().unwrap()
    }

    #[tokio::test]
    async fn test_write_creates_parents_then_read() {
        let (_dir, policy, backend) = setup();

        let out = backend
            .execute(
                "ws-local",
                Operation::Write {
                    path: path(&policy, "src/app/page.tsx"),
                    content: "export default 1;\n".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(out, BackendOutput::Written { bytes: 18 });

        let out = backend
            .execute(
                "ws-local",
                Operation::Read {
                    path: path(&policy, "src/app/page.tsx"),
                },
            )
            .await
            .unwrap();
        assert_eq!(out, BackendOutput::Content("export default 1;\n".into()));
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_dir, policy, backend) = setup();
        let err = backend
            .execute(
                "ws-local",
                Operation::Read {
                    path: path(&policy, "nope.txt"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_workspace_mismatch() {
        let (_dir, policy, backend) = setup();
        let err = backend
            .execute(
                "ws-other",
                Operation::Read {
                    path: path(&policy, "a.txt"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::WorkspaceMismatch { .. }));
    }

    #[tokio::test]
    async fn test_list_shallow_and_recursive() {
        let (dir, policy, backend) = setup();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();
        std::fs::write(dir.path().join("src/nested/lib.rs"), "").unwrap();

        let out = backend
            .execute(
                "ws-local",
                Operation::List {
                    path: path(&policy, "."),
                    recursive: false,
                },
            )
            .await
            .unwrap();
        match out {
            BackendOutput::Entries(entries) => {
                let names: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
                assert_eq!(names, vec!["README.md", "src"]);
                assert_eq!(entries[0].size, Some(2));
                assert!(entries[1].is_dir);
            }
            other => panic!("unexpected output: {:?}", other),
        }

        let out = backend
            .execute(
                "ws-local",
                Operation::List {
                    path: path(&policy, "src"),
                    recursive: true,
                },
            )
            .await
            .unwrap();
        match out {
            BackendOutput::Entries(entries) => {
                let names: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
                assert_eq!(names, vec!["nested", "nested/lib.rs"]);
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_and_list_limits() {
        let dir = tempfile::tempdir().unwrap();
        let policy = SandboxPolicy::new(dir.path(), "ws-local").unwrap();
        let backend = LocalBackend::for_policy(&policy)
            .with_max_read_bytes(4)
            .with_max_entries(2);
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(dir.path().join(name), "12345").unwrap();
        }

        let err = backend
            .execute(
                "ws-local",
                Operation::Read {
                    path: path(&policy, "a.txt"),
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too large"), "{}", err);

        let out = backend
            .execute(
                "ws-local",
                Operation::List {
                    path: path(&policy, "."),
                    recursive: true,
                },
            )
            .await
            .unwrap();
        match out {
            BackendOutput::Entries(entries) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_file_only() {
        let (dir, policy, backend) = setup();
        std::fs::create_dir_all(dir.path().join("build")).unwrap();
        std::fs::write(dir.path().join("old.log"), "x").unwrap();

        let out = backend
            .execute(
                "ws-local",
                Operation::Delete {
                    path: path(&policy, "old.log"),
                },
            )
            .await
            .unwrap();
        assert_eq!(out, BackendOutput::Deleted);
        assert!(!dir.path().join("old.log").exists());

        let err = backend
            .execute(
                "ws-local",
                Operation::Delete {
                    path: path(&policy, "build"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidTarget(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_blocked() {
        let (dir, policy, backend) = setup();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "top secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let err = backend
            .execute(
                "ws-local",
                Operation::Read {
                    path: path(&policy, "link/secret.txt"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Escape(_)));

        let err = backend
            .execute(
                "ws-local",
                Operation::Write {
                    path: path(&policy, "link/new.txt"),
                    content: "x".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Escape(_)));
        assert!(!outside.path().join("new.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_to_denied_file_blocked() {
        let (dir, policy, backend) = setup();
        std::fs::write(dir.path().join(".env"), "SECRET=hunter2").unwrap();
        std::os::unix::fs::symlink(dir.path().join(".env"), dir.path().join("notes.txt"))
            .unwrap();
        std::fs::create_dir_all(dir.path().join(".ssh")).unwrap();
        std::os::unix::fs::symlink(dir.path().join(".ssh"), dir.path().join("keys")).unwrap();

        let err = backend
            .execute(
                "ws-local",
                Operation::Read {
                    path: path(&policy, "notes.txt"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Denied { .. }));
        assert!(!err.to_string().contains("hunter2"));

        let err = backend
            .execute(
                "ws-local",
                Operation::Write {
                    path: path(&policy, "keys/authorized_keys"),
                    content: "ssh-ed25519 AAAA".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Denied { .. }));
        assert!(!dir.path().join(".ssh/authorized_keys").exists());
    }

    #[tokio::test]
    async fn test_listing_hides_denied_entries_and_git_dir() {
        let (dir, policy, backend) = setup();
        std::fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        std::fs::write(dir.path().join(".git/objects/ab"), "blob").unwrap();
        std::fs::create_dir_all(dir.path().join(".forgebox")).unwrap();
        std::fs::write(dir.path().join(".forgebox/forgebox.json"), "{}").unwrap();
        std::fs::create_dir_all(dir.path().join("src/config")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/config/.env.local"), "K=V").unwrap();
        std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        std::fs::write(dir.path().join("server.pem"), "cert").unwrap();

        let out = backend
            .execute(
                "ws-local",
                Operation::List {
                    path: path(&policy, "."),
                    recursive: false,
                },
            )
            .await
            .unwrap();
        match out {
            BackendOutput::Entries(entries) => {
                let names: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
                assert_eq!(names, vec![".git", "src"]);
            }
            other => panic!("unexpected output: {:?}", other),
        }

        let out = backend
            .execute(
                "ws-local",
                Operation::List {
                    path: path(&policy, "."),
                    recursive: true,
                },
            )
            .await
            .unwrap();
        match out {
            BackendOutput::Entries(entries) => {
                let names: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
                assert_eq!(names, vec!["src", "src/config", "src/lib.rs"]);
            }
            other => panic!("unexpected output: {:?}", other),
        }

        let out = backend
            .execute(
                "ws-local",
                Operation::List {
                    path: path(&policy, "src/config"),
                    recursive: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(out, BackendOutput::Entries(Vec::new()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_and_timeout() {
        let (dir, policy, backend) = setup();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();

        let command = policy
            .validate_command("pwd && echo err >&2 && exit 3")
            .into_sandbox_command()
            .unwrap();
        let out = backend
            .execute(
                "ws-local",
                Operation::Run {
                    command,
                    cwd: path(&policy, "sub"),
                    timeout: Duration::from_secs(10),
                },
            )
            .await
            .unwrap();
        match out {
            BackendOutput::Command(output) => {
                assert_eq!(output.exit_code, Some(3));
                assert!(output.stdout.trim_end().ends_with("sub"));
                assert_eq!(output.stderr.trim(), "err");
                assert!(!output.success());
            }
            other => panic!("unexpected output: {:?}", other),
        }

        let command = policy
            .validate_command("sleep 5")
            .into_sandbox_command()
            .unwrap();
        let err = backend
            .execute(
                "ws-local",
                Operation::Run {
                    command,
                    cwd: path(&policy, "."),
                    timeout: Duration::from_millis(100),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Timeout(_)));
    }
}
