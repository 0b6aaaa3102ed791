//! Tool definitions and their three renderings

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use triage_provider::ToolDef;

use crate::security::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Knowledge,
    Observability,
    Command,
    External,
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Knowledge => "knowledge",
            Self::Observability => "observability",
            Self::Command => "command",
            Self::External => "external",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    /// JSON Schema type
    pub param_type: String,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Item schema for arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
}

impl ToolParameter {
    pub fn new(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required,
            default: None,
            enum_values: None,
            items: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self::new(name, "string", description, required)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self::new(name, "integer", description, required)
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn with_items(mut self, items: Value) -> Self {
        self.items = Some(items);
        self
    }

    /// JSON Schema of this parameter
    pub fn to_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.param_type));
        if !self.description.is_empty() {
            schema.insert("description".into(), json!(self.description));
        }
        if let Some(values) = &self.enum_values {
            schema.insert("enum".into(), json!(values));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        if let Some(items) = &self.items {
            schema.insert("items".into(), items.clone());
        }
        Value::Object(schema)
    }
}

/// A registered capability. Immutable once handed to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub risk_level: RiskLevel,
    pub requires_confirmation: bool,
    pub parameters: Vec<ToolParameter>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, category: ToolCategory) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            risk_level: RiskLevel::Low,
            requires_confirmation: false,
            parameters: Vec::new(),
        }
    }

    pub fn risk_level(mut self, risk: RiskLevel) -> Self {
        self.risk_level = risk;
        self
    }

    pub fn requires_confirmation(mut self, required: bool) -> Self {
        self.requires_confirmation = required;
        self
    }

    pub fn param(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Provider-level definition
    pub fn to_tool_def(&self) -> ToolDef {
        self.parameters
            .iter()
            .fold(ToolDef::new(&self.name, &self.description), |def, p| {
                def.with_param(&p.name, p.to_schema(), p.required)
            })
    }

    /// `{type: "function", function: {name, description, parameters}}`
    pub fn function_schema(&self) -> Value {
        self.to_tool_def().function_schema()
    }

    /// `{name, description, input_schema}`
    pub fn anthropic_schema(&self) -> Value {
        self.to_tool_def().input_schema_tool()
    }

    /// Bullet block for text-parsing prompts
    pub fn text_description(&self) -> String {
        let mut out = format!("- {}: {}", self.name, self.description);
        for p in &self.parameters {
            out.push_str(&format!(
                "\n    - {} ({}, {}): {}",
                p.name,
                p.param_type,
                if p.required { "required" } else { "optional" },
                p.description
            ));
            if let Some(values) = &p.enum_values {
                out.push_str(&format!(" [one of: {}]", values.join(", ")));
            }
            if let Some(default) = &p.default {
                out.push_str(&format!(" [default: {}]", default));
            }
        }
        out
    }
}
