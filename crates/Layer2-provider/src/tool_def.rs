//! Tool definitions as sent to the LLM
//!
//! `ToolDef` is the vendor-neutral wire form. It renders itself into the two
//! structured shapes providers accept.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Definition of a tool that can be called by the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool name (unique within one request)
    pub name: String,

    pub description: String,

    /// JSON Schema for parameters
    pub parameters: ToolParameters,
}

/// Parameters schema for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameters {
    /// Always "object"
    #[serde(rename = "type")]
    pub schema_type: String,

    pub properties: Value,

    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: json!({}),
            required: vec![],
        }
    }
}

impl ToolParameters {
    pub fn to_schema(&self) -> Value {
        json!({
            "type": self.schema_type,
            "properties": self.properties,
            "required": self.required
        })
    }
}

impl ToolDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: ToolParameters::default(),
        }
    }

    /// Add a parameter with its full property schema
    pub fn with_param(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();

        if let Value::Object(ref mut props) = self.parameters.properties {
            props.insert(name.clone(), schema);
        }

        if required {
            self.parameters.required.push(name);
        }

        self
    }

    pub fn with_string_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.with_param(
            name,
            json!({ "type": "string", "description": description.into() }),
            required,
        )
    }

    /// `{type:"function", function:{name, description, parameters}}`
    pub fn function_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters.to_schema()
            }
        })
    }

    /// `{name, description, input_schema}`
    pub fn input_schema_tool(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.parameters.to_schema()
        })
    }
}
