use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// LLM vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    Openai,
    Gemini,
    Ollama,
    Groq,
}

impl ProviderType {
    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Anthropic => "Anthropic",
            Self::Openai => "OpenAI",
            Self::Gemini => "Gemini",
            Self::Ollama => "Ollama",
            Self::Groq => "Groq",
        }
    }

    /// Structured function calling is available; otherwise the agent falls
    /// back to text-parsed ReAct prompting.
    pub fn supports_function_calling(&self) -> bool {
        !matches!(self, Self::Ollama)
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Openai => Some("OPENAI_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::Ollama => None,
        }
    }

    /// Default base URL. OpenAI, Gemini and Groq speak the OpenAI-compatible
    /// chat completions dialect under this prefix.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::Openai => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Openai => "gpt-4o",
            Self::Gemini => "gemini-2.0-flash",
            Self::Groq => "llama-3.3-70b-versatile",
            Self::Ollama => "llama3",
        }
    }

    pub fn default_max_tokens(&self) -> u32 {
        match self {
            Self::Openai => 4096,
            _ => 8192,
        }
    }

    /// Default request timeout (seconds)
    pub fn default_timeout(&self) -> u64 {
        match self {
            Self::Ollama => 600,
            Self::Groq => 60,
            _ => 300,
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name().to_lowercase())
    }
}

impl Default for ProviderType {
    fn default() -> Self {
        Self::Anthropic
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "gpt" => Ok(Self::Openai),
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            "groq" => Ok(Self::Groq),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// Provider connection settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<ProviderType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ProviderSettings {
    pub fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type: Some(provider_type),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let provider_type = self.effective_type();
        if provider_type.requires_api_key() && self.api_key.is_none() {
            return Err(format!("{} requires an API key", provider_type));
        }
        Ok(())
    }

    // effective values
    pub fn effective_type(&self) -> ProviderType {
        self.provider_type.unwrap_or_default()
    }

    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.effective_type().default_base_url())
    }

    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.effective_type().default_model())
    }

    pub fn effective_max_tokens(&self) -> u32 {
        self.max_tokens
            .unwrap_or_else(|| self.effective_type().default_max_tokens())
    }

    pub fn effective_timeout(&self) -> u64 {
        self.timeout_secs
            .unwrap_or_else(|| self.effective_type().default_timeout())
    }

    /// `other` wins field by field. Switching vendor drops vendor-bound fields
    /// the other side did not set.
    pub fn merge(&mut self, other: ProviderSettings) {
        if let Some(provider_type) = other.provider_type {
            if self.provider_type != Some(provider_type) {
                self.model = None;
                self.api_key = None;
                self.base_url = None;
            }
            self.provider_type = Some(provider_type);
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.max_tokens.is_some() {
            self.max_tokens = other.max_tokens;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
    }

    // builder
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}
