//! Tool Schema - 도구의 선언적 인자 계약
//!
//! 모델에게 노출되는 wire format은 안정적입니다:
//! `{ name, description, parameters: { type: "object", properties, required } }`
//!
//! 각 파라미터에는 직렬화되지 않는 `Sensitivity` 태그가 붙어
//! 레지스트리가 어떤 인자를 보안 검증해야 하는지 알 수 있습니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Parameter Types
// ============================================================================

/// JSON Schema 기본 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// 값이 선언된 타입과 일치하는지 (문자열 "5" → integer 같은 재해석 없음)
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 인자의 보안 민감도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sensitivity {
    /// 검증 없이 그대로 전달
    #[default]
    Plain,
    /// 샌드박스 경로 - validate_path 통과 필수
    Path,
    /// 셸 명령어 - validate_command 통과 필수
    Command,
}

/// 파라미터 타입 명세
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,

    pub description: String,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,

    #[serde(skip)]
    pub sensitivity: Sensitivity,
}

impl ParamSpec {
    pub fn new(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            allowed: None,
            sensitivity: Sensitivity::Plain,
        }
    }

    pub fn with_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.allowed = Some(values);
        self
    }
}

/// `parameters` 객체
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type")]
    pub schema_type: String,

    #[serde(default)]
    pub properties: BTreeMap<String, ParamSpec>,

    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

impl ToolParameters {
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

// ============================================================================
// Tool Schema
// ============================================================================

/// 도구 스키마 (레지스트리 내에서 이름 유일)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
}

impl ToolSchema {
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> ToolSchemaBuilder {
        ToolSchemaBuilder::new(name, description)
    }

    /// 민감도가 Plain이 아닌 인자 목록
    pub fn sensitive_params(&self) -> impl Iterator<Item = (&str, Sensitivity)> {
        self.parameters
            .properties
            .iter()
            .filter(|(_, spec)| spec.sensitivity != Sensitivity::Plain)
            .map(|(name, spec)| (name.as_str(), spec.sensitivity))
    }
}

/// ToolSchema 빌더
pub struct ToolSchemaBuilder {
    name: String,
    description: String,
    parameters: ToolParameters,
}

impl ToolSchemaBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: ToolParameters::default(),
        }
    }

    fn param(mut self, name: impl Into<String>, spec: ParamSpec, required: bool) -> Self {
        let name = name.into();
        if required && !self.parameters.is_required(&name) {
            self.parameters.required.push(name.clone());
        }
        self.parameters.properties.insert(name, spec);
        self
    }

    /// 문자열 파라미터
    pub fn string_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.param(name, ParamSpec::new(ParamType::String, description), required)
    }

    /// 샌드박스 경로 파라미터
    pub fn path_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let spec = ParamSpec::new(ParamType::String, description).with_sensitivity(Sensitivity::Path);
        self.param(name, spec, required)
    }

    /// 셸 명령어 파라미터
    pub fn command_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let spec =
            ParamSpec::new(ParamType::String, description).with_sensitivity(Sensitivity::Command);
        self.param(name, spec, required)
    }

    pub fn integer_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.param(name, ParamSpec::new(ParamType::Integer, description), required)
    }

    pub fn boolean_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.param(name, ParamSpec::new(ParamType::Boolean, description), required)
    }

    /// 열거형 문자열 파라미터
    pub fn enum_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: Vec<String>,
        required: bool,
    ) -> Self {
        let spec = ParamSpec::new(ParamType::String, description).with_enum(values);
        self.param(name, spec, required)
    }

    pub fn build(self) -> ToolSchema {
        ToolSchema {
            name: self.name,
            description: self.description,
            parameters: self.parameters,
        }
    }
}
