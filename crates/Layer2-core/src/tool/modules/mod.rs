//! Built-in tool modules

mod command;
mod knowledge;
mod observability;

pub use command::{CommandModule, SUGGEST_COMMAND};
pub use knowledge::{JsonKnowledgeBase, KnowledgeBase, KnowledgeHit, KnowledgeModule, Runbook};
pub use observability::{
    Alert, HttpObservabilityBackend, LogLine, MetricSeries, ObservabilityBackend,
    ObservabilityModule,
};
