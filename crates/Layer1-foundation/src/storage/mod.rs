//! Storage module for Triage
//!
//! - `json`: JSON files under the global config dir or a project's `.triage/`

mod json;

pub use json::JsonStore;
