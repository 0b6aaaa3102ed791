//! # triage-provider
//!
//! LLM provider abstraction layer for Triage.
//!
//! ## Features
//! - One request/response `Provider` trait for every vendor
//! - Native Anthropic content-block encoding
//! - OpenAI-compatible shim for OpenAI, Groq and Gemini
//! - Explicit decoding of each vendor's tool-call shape
//! - Automatic retry with exponential backoff

pub mod error;
pub mod gateway;
pub mod message;
pub mod providers;
pub mod retry;
pub mod tool_call;
pub mod tool_def;
pub mod r#trait;

// Core traits and types
pub use gateway::Gateway;
pub use message::{ensure_unique_ids, Message, MessageRole, ToolCall, ToolResult};
pub use r#trait::{FinishReason, Provider, ProviderResponse, TokenUsage};
pub use tool_call::RawToolCall;
pub use tool_def::{ToolDef, ToolParameters};

// Error and retry
pub use error::ProviderError;
pub use retry::RetryConfig;

// Provider implementations
pub use providers::anthropic::AnthropicProvider;
pub use providers::ollama::OllamaProvider;
pub use providers::openai::OpenAiProvider;
