//! Security Validator - 경로/명령어/워크스페이스 바인딩 검증
//!
//! 모든 함수는 순수하고 결정적입니다. 파일시스템에 접근하지 않으며
//! 공유된 `SandboxPolicy`에 대해 여러 스레드에서 동시에 호출해도 안전합니다.
//!
//! 검증을 통과한 값만 `SandboxPath`/`SandboxCommand`로 만들어지고,
//! 실행 백엔드는 이 두 타입만 받습니다.

use super::policy::{normalize_lexically, SandboxPolicy};
use std::path::{Component, Path, PathBuf};

// ============================================================================
// Validated Values
// ============================================================================

/// 검증을 통과한 샌드박스 내부 경로
///
/// 이 crate의 validator만 생성할 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxPath {
    absolute: PathBuf,
    relative: PathBuf,
}

impl SandboxPath {
    /// 정규화된 절대 경로 (항상 sandbox root로 시작)
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// sandbox root 기준 상대 경로 (루트 자체는 빈 경로)
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    /// 표시용 경로 (루트는 ".")
    pub fn display_relative(&self) -> String {
        if self.is_root() {
            ".".to_string()
        } else {
            self.relative.to_string_lossy().into_owned()
        }
    }
}

impl std::fmt::Display for SandboxPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.absolute.display())
    }
}

/// 검증을 통과한 셸 명령어
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxCommand {
    command: String,
}

impl SandboxCommand {
    pub fn as_str(&self) -> &str {
        &self.command
    }
}

impl std::fmt::Display for SandboxCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.command)
    }
}

// ============================================================================
// Validation Result
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolved {
    Path(SandboxPath),
    Command(SandboxCommand),
}

/// 검증 결과 (호출마다 새로 생성)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub reason: Option<String>,
    pub suggested_path: Option<PathBuf>,
    resolved: Option<Resolved>,
}

impl ValidationResult {
    fn accept(resolved: Option<Resolved>) -> Self {
        Self {
            is_valid: true,
            reason: None,
            suggested_path: None,
            resolved,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
            suggested_path: None,
            resolved: None,
        }
    }

    fn with_suggestion(mut self, suggestion: Option<PathBuf>) -> Self {
        self.suggested_path = suggestion;
        self
    }

    /// 허용된 경로 검증의 결과 경로
    pub fn sandbox_path(&self) -> Option<&SandboxPath> {
        match &self.resolved {
            Some(Resolved::Path(p)) => Some(p),
            _ => None,
        }
    }

    pub fn into_sandbox_path(self) -> Option<SandboxPath> {
        match self.resolved {
            Some(Resolved::Path(p)) => Some(p),
            _ => None,
        }
    }

    pub fn into_sandbox_command(self) -> Option<SandboxCommand> {
        match self.resolved {
            Some(Resolved::Command(c)) => Some(c),
            _ => None,
        }
    }

    /// 모델에게 돌려줄 메시지 ("reason. Did you mean '...'?")
    pub fn describe(&self) -> String {
        let reason = self.reason.as_deref().unwrap_or("valid");
        match &self.suggested_path {
            Some(p) => format!("{}. Did you mean '{}'?", reason, p.display()),
            None => reason.to_string(),
        }
    }
}

// ============================================================================
// Path Validation
// ============================================================================

/// 경로 검증
///
/// 1. `..` 또는 `~` 포함 거부 (빈 문자열, NUL 포함도 거부)
/// 2. 절대 경로는 이미 sandbox root로 시작해야 하고, 상대 경로는 root에 결합
/// 3. 어휘적 정규화
/// 4. 정규화 결과가 root로 시작하는지 최종 확인
/// 5. denylist 확인
pub fn validate_path(raw: &str, policy: &SandboxPolicy) -> ValidationResult {
    let root = policy.sandbox_root();

    if raw.trim().is_empty() {
        return ValidationResult::reject("path is empty");
    }
    if raw.contains('\0') {
        return ValidationResult::reject("path contains a NUL byte");
    }

    if raw.contains("..") || raw.contains('~') {
        return ValidationResult::reject(format!(
            "path '{}' escapes the sandbox: '..' and '~' are not allowed",
            raw
        ))
        .with_suggestion(suggest_without_traversal(raw, policy));
    }

    let raw_path = Path::new(raw);
    let candidate = if raw_path.is_absolute() {
        let starts_in_root = normalize_lexically(raw_path)
            .map(|p| p.starts_with(root))
            .unwrap_or(false);
        if !starts_in_root {
            return ValidationResult::reject(format!(
                "path '{}' escapes the sandbox: absolute paths must be inside {}",
                raw,
                root.display()
            ))
            .with_suggestion(suggest_file_name(raw_path, policy));
        }
        raw_path.to_path_buf()
    } else {
        root.join(raw_path)
    };

    let canonical = match normalize_lexically(&candidate) {
        Some(p) => p,
        None => {
            return ValidationResult::reject(format!("path '{}' escapes the sandbox", raw));
        }
    };

    // 최종 포함 여부 확인
    let relative = match canonical.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            return ValidationResult::reject(format!(
                "path '{}' escapes the sandbox root {}",
                raw,
                root.display()
            ));
        }
    };

    if let Some(pattern) = denied_by(&canonical, &relative, policy) {
        tracing::debug!(path = %canonical.display(), pattern = pattern.0, "Path denied");
        return ValidationResult::reject(format!(
            "path '{}' is denied by sandbox policy: {}",
            raw, pattern.1
        ));
    }

    ValidationResult::accept(Some(Resolved::Path(SandboxPath {
        absolute: canonical,
        relative,
    })))
}

fn denied_by<'a>(
    absolute: &Path,
    relative: &Path,
    policy: &'a SandboxPolicy,
) -> Option<(&'a str, &'a str)> {
    policy
        .denied_path(absolute, relative)
        .map(|p| (p.source(), p.reason()))
}

/// 후보가 실제로 허용되는 경우에만 제안
fn accepted_suggestion(relative: PathBuf, policy: &SandboxPolicy) -> Option<PathBuf> {
    if relative.as_os_str().is_empty() {
        return None;
    }
    let absolute = normalize_lexically(&policy.sandbox_root().join(&relative))?;
    let relative = absolute.strip_prefix(policy.sandbox_root()).ok()?.to_path_buf();
    if relative.as_os_str().is_empty() || denied_by(&absolute, &relative, policy).is_some() {
        return None;
    }
    Some(absolute)
}

/// `..`/`~` 세그먼트를 제거한 경로
fn suggest_without_traversal(raw: &str, policy: &SandboxPolicy) -> Option<PathBuf> {
    let root = policy.sandbox_root();
    let raw_path = Path::new(raw);

    // 루트 안쪽을 가리키는 절대 경로면 루트 부분을 떼어낸다
    let base = normalize_lexically_lossy(raw_path);
    let base = base.strip_prefix(root).map(Path::to_path_buf).unwrap_or(base);

    let kept: PathBuf = base
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => {
                let s = s.to_string_lossy();
                if s.starts_with('~') || s.contains("..") {
                    None
                } else {
                    Some(s.into_owned())
                }
            }
            _ => None,
        })
        .collect();

    accepted_suggestion(kept, policy)
}

/// root 밖 절대 경로 → root + 파일 이름
fn suggest_file_name(raw_path: &Path, policy: &SandboxPolicy) -> Option<PathBuf> {
    let name = raw_path.file_name()?;
    accepted_suggestion(PathBuf::from(name), policy)
}

fn normalize_lexically_lossy(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

// ============================================================================
// Command Validation
// ============================================================================

/// 명령어 검증
///
/// 기본은 허용. 원본 전체와 각 세그먼트(`;`, `&&`, `||`, `|`, 줄바꿈)를
/// shlex로 단어 분리한 형태 양쪽에 denylist를 적용합니다.
pub fn validate_command(raw: &str, policy: &SandboxPolicy) -> ValidationResult {
    let command = raw.trim();
    if command.is_empty() {
        return ValidationResult::reject("command is empty");
    }
    if command.contains('\0') {
        return ValidationResult::reject("command contains a NUL byte");
    }

    let segments = match split_segments(command) {
        Some(segments) => segments,
        None => return ValidationResult::reject("command has unbalanced quotes"),
    };

    let mut normalized = Vec::with_capacity(segments.len() * 2);
    for segment in &segments {
        let words = match shlex::split(segment) {
            Some(words) => words,
            None => return ValidationResult::reject("command has unbalanced quotes"),
        };
        // `/usr/bin/sudo`, `env sudo`, `nohup rm ...` 도 같은 패턴에 걸리도록
        let unwrapped = unwrap_program(&words).join(" ");
        let plain = words.join(" ");
        if unwrapped != plain {
            normalized.push(unwrapped);
        }
        normalized.push(plain);
    }

    for pattern in policy.command_denylist() {
        let hit = pattern.matches_command(command)
            || normalized.iter().any(|s| pattern.matches_command(s));
        if hit {
            tracing::debug!(command = %command, pattern = pattern.source(), "Command denied");
            return ValidationResult::reject(format!(
                "command denied by sandbox policy: {}",
                pattern.reason()
            ));
        }
    }

    ValidationResult::accept(Some(Resolved::Command(SandboxCommand {
        command: command.to_string(),
    })))
}

/// 실행 래퍼와 그 옵션을 벗겨낸 단어 목록 (프로그램은 basename으로)
///
/// `env FOO=1 nohup /usr/bin/sudo id` → `sudo id`
fn unwrap_program(words: &[String]) -> Vec<String> {
    let mut rest = words;

    loop {
        while let Some((first, tail)) = rest.split_first() {
            if !is_assignment(first) {
                break;
            }
            rest = tail;
        }

        let Some((first, tail)) = rest.split_first() else {
            break;
        };
        let program = program_name(first);
        let Some(value_flags) = wrapper_value_flags(program) else {
            break;
        };
        rest = tail;

        while let Some((flag, tail)) = rest.split_first() {
            if !flag.starts_with('-') || flag == "-" {
                break;
            }
            rest = tail;
            if value_flags.contains(&flag.as_str()) {
                rest = skip_one(rest);
            }
        }

        // timeout DURATION COMMAND...
        if program == "timeout" {
            rest = skip_one(rest);
        }
    }

    let mut unwrapped = rest.to_vec();
    if let Some(first) = unwrapped.first_mut() {
        let name = program_name(first).to_string();
        *first = name;
    }
    unwrapped
}

const NO_VALUE_FLAGS: &[&str] = &[];
const ENV_VALUE_FLAGS: &[&str] = &["-u", "--unset", "-C", "--chdir"];
const EXEC_VALUE_FLAGS: &[&str] = &["-a"];
const NICE_VALUE_FLAGS: &[&str] = &["-n", "--adjustment"];
const TIME_VALUE_FLAGS: &[&str] = &["-f", "--format", "-o", "--output"];
const TIMEOUT_VALUE_FLAGS: &[&str] = &["-s", "--signal", "-k", "--kill-after"];
const XARGS_VALUE_FLAGS: &[&str] = &["-I", "-n", "-P", "-L", "-s", "-d", "-E", "-a"];

/// 다른 프로그램을 실행하는 래퍼면 값을 받는 옵션 목록
fn wrapper_value_flags(program: &str) -> Option<&'static [&'static str]> {
    match program {
        "env" => Some(ENV_VALUE_FLAGS),
        "exec" => Some(EXEC_VALUE_FLAGS),
        "command" | "builtin" | "nohup" | "setsid" | "stdbuf" => Some(NO_VALUE_FLAGS),
        "nice" | "ionice" => Some(NICE_VALUE_FLAGS),
        "time" => Some(TIME_VALUE_FLAGS),
        "timeout" => Some(TIMEOUT_VALUE_FLAGS),
        "xargs" => Some(XARGS_VALUE_FLAGS),
        _ => None,
    }
}

fn skip_one(words: &[String]) -> &[String] {
    words.split_first().map(|(_, tail)| tail).unwrap_or(words)
}

fn is_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}

/// `/usr/bin/sudo` → `sudo`
fn program_name(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}

/// 따옴표 밖의 `;`, `&&`, `||`, `|`, `&`, 줄바꿈에서 분리
///
/// 따옴표가 닫히지 않으면 None.
fn split_segments(command: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = command.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' if !in_single => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(c);
            }
            ';' | '\n' | '|' | '&' if !in_single && !in_double => {
                // `&&`, `||`, `|&` 같은 2글자 연산자 흡수
                if matches!(chars.peek(), Some('&') | Some('|')) {
                    chars.next();
                }
                // `2>&1` 같은 리다이렉트는 분리하지 않음
                if c == '&' && current.ends_with('>') {
                    current.push(c);
                    continue;
                }
                push_segment(&mut segments, &mut current);
            }
            _ => current.push(c),
        }
    }

    if in_single || in_double {
        return None;
    }
    push_segment(&mut segments, &mut current);
    Some(segments)
}

fn push_segment(segments: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
    current.clear();
}

// ============================================================================
// Workspace Binding
// ============================================================================

/// 세션이 주장하는 워크스페이스가 정책에 바인딩된 것과 같은지 확인
pub fn validate_workspace_binding(
    policy: &SandboxPolicy,
    claimed_workspace_id: &str,
) -> ValidationResult {
    if claimed_workspace_id == policy.authorized_workspace_id() {
        ValidationResult::accept(None)
    } else {
        ValidationResult::reject(format!(
            "workspace '{}' is not authorized for this session",
            claimed_workspace_id
        ))
    }
}
