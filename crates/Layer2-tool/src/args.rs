//! Tool Arguments - 스키마 검사와 보안 해석을 통과한 인자
//!
//! 레지스트리는 핸들러를 부르기 전에:
//! 1. 인자가 객체인지, 선언되지 않은 인자가 없는지
//! 2. 필수 인자가 모두 있는지
//! 3. 타입과 enum이 선언과 일치하는지
//! 4. 경로/명령어 태그가 붙은 인자가 정책 검증을 통과하는지
//! 를 확인하고 `ToolArgs`를 만듭니다. 문자열 "5"를 정수로 바꾸는 식의
//! 재해석은 하지 않습니다.

use forgebox_foundation::{
    Error, Result, SandboxCommand, SandboxPath, SandboxPolicy, Sensitivity, ToolErrorKind,
    ToolResult, ToolSchema,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// 검증된 도구 인자
#[derive(Debug, Clone, Default)]
pub struct ToolArgs {
    values: Map<String, Value>,
    paths: BTreeMap<String, SandboxPath>,
    commands: BTreeMap<String, SandboxCommand>,
}

impl ToolArgs {
    /// 원본 JSON 값
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// 필수 경로 인자
    pub fn path(&self, name: &str) -> Result<&SandboxPath> {
        self.paths
            .get(name)
            .ok_or_else(|| Error::Internal(format!("path argument '{}' was not resolved", name)))
    }

    /// 선택 경로 인자
    pub fn optional_path(&self, name: &str) -> Option<&SandboxPath> {
        self.paths.get(name)
    }

    /// 필수 명령어 인자
    pub fn command(&self, name: &str) -> Result<&SandboxCommand> {
        self.commands.get(name).ok_or_else(|| {
            Error::Internal(format!("command argument '{}' was not resolved", name))
        })
    }

    /// 필수 문자열 인자
    pub fn str(&self, name: &str) -> Result<&str> {
        self.optional_str(name)
            .ok_or_else(|| Error::Internal(format!("string argument '{}' is missing", name)))
    }

    pub fn optional_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn optional_u64(&self, name: &str) -> Option<u64> {
        self.values.get(name).and_then(Value::as_u64)
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.values
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }
}

fn invalid(message: String) -> ToolResult {
    ToolResult::error(ToolErrorKind::InvalidArguments, message)
}

/// 스키마 검사 + 보안 해석
///
/// 실패는 호출자에게 그대로 돌려줄 `ToolResult`입니다.
pub fn resolve_arguments(
    schema: &ToolSchema,
    arguments: Value,
    policy: &SandboxPolicy,
) -> std::result::Result<ToolArgs, ToolResult> {
    let mut values = match arguments {
        Value::Object(map) => map,
        other => {
            return Err(invalid(format!(
                "arguments for '{}' must be a JSON object, got {}",
                schema.name,
                json_kind(&other)
            )))
        }
    };

    let params = &schema.parameters;

    // 선언되지 않은 인자
    let mut unexpected: Vec<&str> = values
        .keys()
        .filter(|k| !params.properties.contains_key(k.as_str()))
        .map(String::as_str)
        .collect();
    if !unexpected.is_empty() {
        unexpected.sort_unstable();
        return Err(invalid(format!(
            "unexpected argument(s) for '{}': {}",
            schema.name,
            unexpected.join(", ")
        )));
    }

    // 선택 인자의 명시적 null은 생략으로 취급
    values.retain(|name, value| !(value.is_null() && !params.is_required(name)));

    for name in &params.required {
        match values.get(name) {
            None | Some(Value::Null) => {
                return Err(invalid(format!(
                    "missing required argument '{}' for '{}'",
                    name, schema.name
                )))
            }
            Some(_) => {}
        }
    }

    let mut args = ToolArgs::default();

    for (name, spec) in &params.properties {
        let Some(value) = values.get(name) else {
            continue;
        };

        if !spec.param_type.matches(value) {
            return Err(invalid(format!(
                "argument '{}' must be {}, got {}",
                name,
                spec.param_type,
                json_kind(value)
            )));
        }

        if let (Some(allowed), Some(s)) = (&spec.allowed, value.as_str()) {
            if !allowed.iter().any(|a| a == s) {
                return Err(invalid(format!(
                    "argument '{}' must be one of [{}], got '{}'",
                    name,
                    allowed.join(", "),
                    s
                )));
            }
        }

        match spec.sensitivity {
            Sensitivity::Plain => {}
            Sensitivity::Path => {
                let raw = value.as_str().unwrap_or_default();
                let result = policy.validate_path(raw);
                if !result.is_valid {
                    return Err(validation_failure(name, &result));
                }
                if let Some(path) = result.into_sandbox_path() {
                    args.paths.insert(name.clone(), path);
                }
            }
            Sensitivity::Command => {
                let raw = value.as_str().unwrap_or_default();
                let result = policy.validate_command(raw);
                if !result.is_valid {
                    return Err(validation_failure(name, &result));
                }
                if let Some(command) = result.into_sandbox_command() {
                    args.commands.insert(name.clone(), command);
                }
            }
        }
    }

    args.values = values;
    Ok(args)
}

fn validation_failure(
    name: &str,
    result: &forgebox_foundation::ValidationResult,
) -> ToolResult {
    let reason = result.reason.as_deref().unwrap_or("rejected by sandbox policy");
    let mut failure = ToolResult::error(
        ToolErrorKind::Validation,
        format!("argument '{}': {}", name, reason),
    );
    if let Some(suggested) = &result.suggested_path {
        failure = failure
            .with_message(format!("Did you mean '{}'?", suggested.display()))
            .with_data(json!({ "suggestedPath": suggested.display().to_string() }));
    }
    failure
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
