//! Provider implementations
//!
//! - `openai`: OpenAI-compatible chat completions (OpenAI, Groq, Gemini)
//! - `anthropic`: Messages API with native content blocks
//! - `ollama`: native `/api/chat`

pub mod anthropic;
pub mod ollama;
pub mod openai;
