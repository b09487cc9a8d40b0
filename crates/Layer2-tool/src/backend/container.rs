//! Container Backend - docker/podman exec로 워크스페이스 컨테이너에서 실행
//!
//! 컨테이너의 생성/시작/정지는 외부 라이프사이클 관리자가 담당합니다.
//! 이 백엔드는 이미 실행 중인 컨테이너에 `exec`만 합니다.
//! 인자는 argv로 직접 넘기고, 컨테이너 안의 `sh -c` 스크립트에 들어가는
//! 값만 shlex로 quoting합니다.

use super::{BackendError, BackendOutput, CommandOutput, DirEntry, ExecutionBackend, Operation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// 파일 작업 기본 타임아웃
const FILE_OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Container runtime type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    #[default]
    Docker,
    Podman,
}

impl ContainerRuntime {
    /// Get the CLI command for this runtime
    pub fn command(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "docker" => Some(Self::Docker),
            "podman" => Some(Self::Podman),
            _ => None,
        }
    }
}

/// 컨테이너 exec 호출 계획
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExecPlan {
    args: Vec<String>,
    stdin: Option<String>,
    timeout: Duration,
}

/// docker/podman exec 백엔드
#[derive(Debug, Clone)]
pub struct ContainerBackend {
    runtime: ContainerRuntime,
    container: String,
    workspace_id: String,
    max_entries: usize,
}

impl ContainerBackend {
    pub fn new(
        runtime: ContainerRuntime,
        container: impl Into<String>,
        workspace_id: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            container: container.into(),
            workspace_id: workspace_id.into(),
            max_entries: 1000,
        }
    }

    pub fn docker(container: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self::new(ContainerRuntime::Docker, container, workspace_id)
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// 런타임 CLI 사용 가능 여부
    pub async fn is_available(&self) -> bool {
        Command::new(self.runtime.command())
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn exec_prefix(&self, interactive: bool, workdir: Option<&Path>) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if interactive {
            args.push("-i".to_string());
        }
        if let Some(dir) = workdir {
            args.push("-w".to_string());
            args.push(dir.display().to_string());
        }
        args.push(self.container.clone());
        args
    }

    /// 작업을 exec 인자로 변환
    fn plan(&self, operation: &Operation) -> Result<ExecPlan, BackendError> {
        let plan = match operation {
            Operation::Read { path } => {
                let mut args = self.exec_prefix(false, None);
                args.extend([
                    "cat".to_string(),
                    "--".to_string(),
                    path.absolute().display().to_string(),
                ]);
                ExecPlan {
                    args,
                    stdin: None,
                    timeout: FILE_OP_TIMEOUT,
                }
            }
            Operation::Write { path, content } => {
                let target = quote(path.absolute())?;
                let parent = quote(path.absolute().parent().unwrap_or(path.absolute()))?;
                let script = format!(
                    "test -d {target} && exit 21; mkdir -p -- {parent} && cat > {target}"
                );
                let mut args = self.exec_prefix(true, None);
                args.extend(["sh".to_string(), "-c".to_string(), script]);
                ExecPlan {
                    args,
                    stdin: Some(content.clone()),
                    timeout: FILE_OP_TIMEOUT,
                }
            }
            Operation::List { path, recursive } => {
                let mut args = self.exec_prefix(false, None);
                args.extend([
                    "find".to_string(),
                    path.absolute().display().to_string(),
                    "-mindepth".to_string(),
                    "1".to_string(),
                ]);
                if !recursive {
                    args.extend(["-maxdepth".to_string(), "1".to_string()]);
                }
                args.extend(["-printf".to_string(), "%y\t%s\t%P\n".to_string()]);
                ExecPlan {
                    args,
                    stdin: None,
                    timeout: FILE_OP_TIMEOUT,
                }
            }
            Operation::Delete { path } => {
                if path.is_root() {
                    return Err(BackendError::InvalidTarget(
                        "cannot delete the sandbox root".to_string(),
                    ));
                }
                let target = quote(path.absolute())?;
                let script = format!(
                    "test -d {target} && exit 21; test -e {target} || exit 22; rm -f -- {target}"
                );
                let mut args = self.exec_prefix(false, None);
                args.extend(["sh".to_string(), "-c".to_string(), script]);
                ExecPlan {
                    args,
                    stdin: None,
                    timeout: FILE_OP_TIMEOUT,
                }
            }
            Operation::Run {
                command,
                cwd,
                timeout,
            } => {
                let mut args = self.exec_prefix(false, Some(cwd.absolute()));
                args.extend([
                    "sh".to_string(),
                    "-c".to_string(),
                    command.as_str().to_string(),
                ]);
                ExecPlan {
                    args,
                    stdin: None,
                    timeout: *timeout,
                }
            }
        };
        Ok(plan)
    }

    async fn spawn(&self, plan: ExecPlan) -> Result<CommandOutput, BackendError> {
        let mut cmd = Command::new(self.runtime.command());
        cmd.args(&plan.args)
            .stdin(if plan.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            BackendError::Unavailable(format!("{}: {}", self.runtime.command(), e))
        })?;

        if let (Some(content), Some(mut stdin)) = (plan.stdin, child.stdin.take()) {
            stdin
                .write_all(content.as_bytes())
                .await
                .map_err(|e| BackendError::Io(format!("failed to stream content: {}", e)))?;
            // stdin을 닫아야 cat이 끝난다
            drop(stdin);
        }

        let output = match tokio::time::timeout(plan.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(BackendError::Io(e.to_string())),
            Err(_) => return Err(BackendError::Timeout(plan.timeout)),
        };

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn parse_entries(&self, stdout: &str) -> Vec<DirEntry> {
        let mut entries: Vec<DirEntry> = stdout
            .lines()
            .filter_map(|line| {
                let mut parts = line.splitn(3, '\t');
                let kind = parts.next()?;
                let size = parts.next()?.parse::<u64>().ok();
                let path = parts.next()?.to_string();
                let is_dir = kind == "d";
                Some(DirEntry {
                    path,
                    is_dir,
                    size: if kind == "f" { size } else { None },
                })
            })
            .take(self.max_entries)
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}

fn quote(path: &Path) -> Result<String, BackendError> {
    let raw = path.to_string_lossy();
    shlex::try_quote(&raw)
        .map(|q| q.into_owned())
        .map_err(|e| BackendError::InvalidTarget(format!("cannot quote {}: {}", raw, e)))
}

/// 파일 작업의 비정상 종료를 BackendError로 변환
fn file_op_failure(operation: &Operation, output: &CommandOutput) -> BackendError {
    let target = match operation {
        Operation::Read { path }
        | Operation::Write { path, .. }
        | Operation::List { path, .. }
        | Operation::Delete { path } => path.display_relative(),
        Operation::Run { cwd, .. } => cwd.display_relative(),
    };
    let stderr = output.stderr.trim();

    match output.exit_code {
        Some(21) => BackendError::InvalidTarget(format!("{} is a directory", target)),
        Some(22) => BackendError::NotFound(target),
        Some(126) | Some(127) if stderr.contains("executable file not found") => {
            BackendError::Unavailable(stderr.to_string())
        }
        _ if stderr.contains("No such file or directory") => BackendError::NotFound(target),
        _ if stderr.contains("Is a directory") => {
            BackendError::InvalidTarget(format!("{} is a directory", target))
        }
        _ if stderr.contains("Permission denied") => BackendError::PermissionDenied(target),
        _ if stderr.contains("No such container") || stderr.contains("is not running") => {
            BackendError::Unavailable(stderr.to_string())
        }
        _ => BackendError::Io(format!("{}: {}", target, stderr)),
    }
}

#[async_trait]
impl ExecutionBackend for ContainerBackend {
    fn name(&self) -> &str {
        self.runtime.command()
    }

    async fn execute(
        &self,
        workspace_id: &str,
        operation: Operation,
    ) -> Result<BackendOutput, BackendError> {
        if workspace_id != self.workspace_id {
            return Err(BackendError::WorkspaceMismatch {
                expected: self.workspace_id.clone(),
                actual: workspace_id.to_string(),
            });
        }

        let plan = self.plan(&operation)?;
        debug!(
            backend = self.runtime.command(),
            container = %self.container,
            op = operation.kind(),
            "Executing operation"
        );
        let output = self.spawn(plan).await?;

        match &operation {
            Operation::Run { .. } => {
                if output.exit_code == Some(125) && output.stderr.contains("No such container") {
                    warn!(container = %self.container, "Workspace container is gone");
                    return Err(BackendError::Unavailable(output.stderr.trim().to_string()));
                }
                Ok(BackendOutput::Command(output))
            }
            _ if !output.success() => Err(file_op_failure(&operation, &output)),
            Operation::Read { .. } => Ok(BackendOutput::Content(output.stdout)),
            Operation::Write { content, .. } => Ok(BackendOutput::Written {
                bytes: content.len(),
            }),
            Operation::List { .. } => Ok(BackendOutput::Entries(self.parse_entries(&output.stdout))),
            Operation::Delete { .. } => Ok(BackendOutput::Deleted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgebox_foundation::SandboxPolicy;

    fn policy() -> SandboxPolicy {
        SandboxPolicy::new("/workspace/proj", "ws-1").unwrap()
    }

    #[test]
    fn test_read_plan() {
        let backend = ContainerBackend::docker("forgebox-ws-1", "ws-1");
        let path = policy().validate_path("src/main.rs").into_sandbox_path().unwrap();
        let plan = backend.plan(&Operation::Read { path }).unwrap();
        assert_eq!(
            plan.args,
            vec!["exec", "forgebox-ws-1", "cat", "--", "/workspace/proj/src/main.rs"]
        );
        assert!(plan.stdin.is_none());
    }

    #[test]
    fn test_write_plan_quotes_paths() {
        let backend = ContainerBackend::docker("c1", "ws-1");
        let path = policy()
            .validate_path("notes/it's here.md")
            .into_sandbox_path()
            .unwrap();
        let plan = backend
            .plan(&Operation::Write {
                path,
                content: "hello".to_string(),
            })
            .unwrap();

        assert_eq!(&plan.args[..3], &["exec", "-i", "c1"]);
        assert_eq!(plan.args[3], "sh");
        let script = &plan.args[5];
        // 따옴표가 포함된 경로는 그대로 셸에 들어가지 않는다
        assert!(!script.contains("> /workspace/proj/notes/it's here.md"));
        assert!(script.contains("mkdir -p --"));
        assert_eq!(plan.stdin.as_deref(), Some("hello"));
    }

    #[test]
    fn test_run_plan_sets_workdir() {
        let backend = ContainerBackend::new(ContainerRuntime::Podman, "c1", "ws-1");
        let policy = policy();
        let plan = backend
            .plan(&Operation::Run {
                command: policy
                    .validate_command("cargo test")
                    .into_sandbox_command()
                    .unwrap(),
                cwd: policy.validate_path("crates/core").into_sandbox_path().unwrap(),
                timeout: Duration::from_secs(5),
            })
            .unwrap();
        assert_eq!(
            plan.args,
            vec!["exec", "-w", "/workspace/proj/crates/core", "c1", "sh", "-c", "cargo test"]
        );
        assert_eq!(plan.timeout, Duration::from_secs(5));
        assert_eq!(backend.name(), "podman");
    }

    #[test]
    fn test_list_plan_depth() {
        let backend = ContainerBackend::docker("c1", "ws-1");
        let path = policy().validate_path(".").into_sandbox_path().unwrap();

        let shallow = backend
            .plan(&Operation::List {
                path: path.clone(),
                recursive: false,
            })
            .unwrap();
        assert!(shallow.args.contains(&"-maxdepth".to_string()));

        let deep = backend
            .plan(&Operation::List {
                path,
                recursive: true,
            })
            .unwrap();
        assert!(!deep.args.contains(&"-maxdepth".to_string()));
    }

    #[test]
    fn test_parse_entries() {
        let backend = ContainerBackend::docker("c1", "ws-1");
        let entries = backend.parse_entries("f\t12\tsrc/main.rs\nd\t4096\tsrc\n");
        assert_eq!(
            entries,
            vec![
                DirEntry {
                    path: "src".to_string(),
                    is_dir: true,
                    size: None
                },
                DirEntry {
                    path: "src/main.rs".to_string(),
                    is_dir: false,
                    size: Some(12)
                },
            ]
        );
    }

    #[test]
    fn test_file_op_failure_mapping() {
        let path = policy().validate_path("missing.txt").into_sandbox_path().unwrap();
        let op = Operation::Read { path };
        let output = CommandOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "cat: /workspace/proj/missing.txt: No such file or directory".to_string(),
        };
        assert_eq!(
            file_op_failure(&op, &output),
            BackendError::NotFound("missing.txt".into())
        );
    }

    #[test]
    fn test_runtime_parse() {
        assert_eq!(ContainerRuntime::parse("Podman"), Some(ContainerRuntime::Podman));
        assert_eq!(ContainerRuntime::parse("lxc"), None);
    }

    #[tokio::test]
    async fn test_workspace_mismatch_before_spawn() {
        let backend = ContainerBackend::docker("c1", "ws-1");
        let path = policy().validate_path("a.txt").into_sandbox_path().unwrap();
        let err = backend
            .execute("ws-2", Operation::Read { path })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::WorkspaceMismatch { .. }));
    }
}
