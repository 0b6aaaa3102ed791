//! Orchestrator - picks the agent loop for the provider
//!
//! Providers with structured function calling get the [`NativeAgent`], the
//! rest get the [`ReactAgent`]. Both sit behind one run / stream contract.

use crate::agent::{Agent, AgentKind};
use crate::context::AgentContext;
use crate::event::{AgentEvent, EventSink};
use crate::native::NativeAgent;
use crate::react::ReactAgent;
use crate::result::AgentResult;
use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use triage_core::ToolRegistry;
use triage_foundation::AgentSettings;
use triage_provider::Provider;

/// Event buffer between a running agent and its stream consumer
const STREAM_BUFFER: usize = 64;

pub struct Orchestrator {
    agent: Box<dyn Agent>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        settings: &AgentSettings,
    ) -> Self {
        Self::with_context(AgentContext::new(provider, tools, settings))
    }

    /// Build from a prepared context (custom policy or prompt)
    pub fn with_context(ctx: AgentContext) -> Self {
        let provider_type = ctx.provider.provider_type();
        let agent: Box<dyn Agent> = if provider_type.supports_function_calling() {
            Box::new(NativeAgent::new(ctx))
        } else {
            Box::new(ReactAgent::new(ctx))
        };
        info!("Orchestrator using {} agent for {}", agent.kind(), provider_type.name());
        Self { agent }
    }

    pub fn kind(&self) -> AgentKind {
        self.agent.kind()
    }

    /// `"native"` or `"react"`
    pub fn mode(&self) -> &'static str {
        self.agent.kind().as_str()
    }

    pub fn agent(&self) -> &dyn Agent {
        self.agent.as_ref()
    }

    pub async fn run(&mut self, message: &str) -> AgentResult {
        self.agent.run(message).await
    }

    pub async fn run_with_events(&mut self, message: &str, events: EventSink) -> AgentResult {
        self.agent.run_with_events(message, events).await
    }

    /// Progress lines while the agent works, then the final answer
    pub fn stream<'a>(&'a mut self, message: &'a str) -> impl Stream<Item = String> + Send + 'a {
        async_stream::stream! {
            let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);
            let run = self.agent.run_with_events(message, EventSink::new(tx));
            tokio::pin!(run);

            let result = loop {
                tokio::select! {
                    result = &mut run => break result,
                    Some(event) = rx.recv() => {
                        if let Some(chunk) = event.render() {
                            if !matches!(event, AgentEvent::Done { .. } | AgentEvent::Error(_)) {
                                yield chunk;
                            }
                        }
                    }
                }
            };

            // Events still buffered when the run returned
            while let Ok(event) = rx.try_recv() {
                if let Some(chunk) = event.render() {
                    if !matches!(event, AgentEvent::Done { .. } | AgentEvent::Error(_)) {
                        yield chunk;
                    }
                }
            }

            yield result.content.clone();
            if let Some(error) = result.error {
                yield format!("\n\nError: {}", error);
            }
        }
    }
}
