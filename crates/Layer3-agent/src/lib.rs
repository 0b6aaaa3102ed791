//! # triage-agent
//!
//! Agent loops for Triage. A troubleshooting request becomes a bounded,
//! ordered sequence of tool calls followed by a recommendation.
//!
//! ## Principles
//!
//! 1. **One writer** - an agent owns its history; `run` takes `&mut self`
//! 2. **Sequential tools** - calls in one turn run in order, never in parallel
//! 3. **Evidence first** - no answer before the [`EvidencePolicy`] is met
//! 4. **Always a result** - failures end up in [`AgentResult::error`]
//!
//! ## Components
//!
//! - **NativeAgent**: structured function calling
//! - **ReactAgent**: text-parsed Thought / Action / Observation
//! - **Orchestrator**: picks one of the two from the provider type
//!
//! ## Usage
//!
//! ```ignore
//! use triage_agent::Orchestrator;
//!
//! let mut orchestrator = Orchestrator::new(provider, registry, &config.agent);
//! let result = orchestrator.run("restart apache on web-1").await;
//! println!("{}", result.content);
//! ```

pub mod agent;
pub mod context;
pub mod event;
pub mod history;
pub mod native;
pub mod orchestrator;
pub mod policy;
pub mod react;
pub mod report;
pub mod result;

// ============================================================================
// Exports
// ============================================================================

pub use agent::{Agent, AgentKind};
pub use context::{default_system_prompt, AgentContext};
pub use event::{AgentEvent, EventSink};
pub use history::MessageHistory;
pub use native::NativeAgent;
pub use orchestrator::Orchestrator;
pub use policy::{DefaultEvidencePolicy, EvidencePolicy, RepeatGuard};
pub use react::{parse_action_input, parse_reply, ParsedAction, ParsedReply, ReactAgent, ReactStep};
pub use result::AgentResult;
