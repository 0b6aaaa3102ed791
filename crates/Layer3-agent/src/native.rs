//! Native tool-calling agent
//!
//! ```text
//! user ──▶ provider.complete(history, tools) ──┬─ tool calls ──▶ registry (in order)
//!              ▲                               │                      │
//!              │                               │       tool turns ◀───┘
//!              │                               │
//!              └── instruction ◀─ not enough ──┴─ text ──▶ evidence check ──▶ answer
//! ```
//!
//! An accepted `suggest_command` ends the run on the spot once the evidence
//! policy is met: the operator runs the command and replies in the next turn.

use crate::agent::{Agent, AgentKind};
use crate::context::AgentContext;
use crate::event::{AgentEvent, EventSink};
use crate::history::MessageHistory;
use crate::policy::RepeatGuard;
use crate::report::{append_missing_links, suggestion_report};
use crate::result::{AgentResult, RunLog};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use triage_core::SUGGEST_COMMAND;
use triage_foundation::{Error, Result};
use triage_provider::ensure_unique_ids;

/// Agent for providers with structured function calling
pub struct NativeAgent {
    ctx: AgentContext,
    history: MessageHistory,
}

impl NativeAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self {
            ctx,
            history: MessageHistory::new(),
        }
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    async fn drive(&mut self, message: &str, log: &mut RunLog, events: &EventSink) -> Result<String> {
        let ctx = &self.ctx;
        let history = &mut self.history;
        let tools = ctx.tool_definitions();
        let required = ctx.policy.required_tool_calls(message);
        let threshold = ctx.policy.stuck_threshold();
        let mut guard = RepeatGuard::new();

        debug!(
            "Native run: {} tools, {} required calls, budget {}",
            tools.len(),
            required,
            ctx.max_iterations
        );

        for iteration in 1..=ctx.max_iterations {
            log.iterations = iteration;
            events.emit(AgentEvent::Thinking { iteration }).await;

            let response = ctx
                .provider
                .complete(history.messages(), &tools, Some(&ctx.system_prompt))
                .await?;

            events
                .emit(AgentEvent::Usage {
                    input_tokens: response.usage.input_tokens,
                    output_tokens: response.usage.output_tokens,
                })
                .await;
            if !response.content.trim().is_empty() {
                events.emit(AgentEvent::Text(response.content.clone())).await;
            }

            // ----------------------------------------------------------------
            // Text only: final answer candidate
            // ----------------------------------------------------------------
            if response.tool_calls.is_empty() {
                let made = log.tool_calls_made.len();
                if !response.content.trim().is_empty() {
                    if ctx.policy.is_satisfied(message, made) {
                        let content = append_missing_links(&response.content, &log.outputs);
                        history.add_assistant(&content);
                        info!("Native run finished after {} iterations, {} tool calls", iteration, made);
                        return Ok(content);
                    }
                    history.add_assistant(&response.content);
                }

                let instruction = if response.content.trim().is_empty() {
                    "Your last reply was empty. Either call a tool or give your final answer.".to_string()
                } else {
                    info!("Answer rejected: {} of {} required tool calls", made, required);
                    ctx.policy.continue_instruction(made, required)
                };
                history.add_user(&instruction);
                events.emit(AgentEvent::Intervention(instruction)).await;
                continue;
            }

            // ----------------------------------------------------------------
            // Tool calls: run in order, one turn each
            // ----------------------------------------------------------------
            let mut calls = response.tool_calls;
            ensure_unique_ids(&mut calls);
            history.add_assistant_with_tools(&response.content, calls.clone());

            let mut suggestion: Option<String> = None;
            let mut stuck_on: Option<String> = None;

            for call in &calls {
                if suggestion.is_some() {
                    history.add_tool_result(
                        &call.id,
                        &call.name,
                        "Skipped: a command was already suggested to the operator.",
                        false,
                    );
                    continue;
                }

                events
                    .emit(AgentEvent::ToolStart {
                        tool_name: call.name.clone(),
                        tool_call_id: call.id.clone(),
                    })
                    .await;

                let outcome = ctx.tools.execute(&call.name, call.arguments.clone()).await;
                let text = outcome.to_string();
                log.record(&call.name, outcome.is_success().then_some(text.as_str()));

                events
                    .emit(AgentEvent::ToolComplete {
                        tool_name: call.name.clone(),
                        tool_call_id: call.id.clone(),
                        result: text.clone(),
                        success: outcome.is_success(),
                    })
                    .await;
                history.add_tool_result(&call.id, &call.name, &text, outcome.is_error());

                if call.name == SUGGEST_COMMAND
                    && outcome.is_success()
                    && ctx.policy.is_satisfied(message, log.tool_calls_made.len())
                {
                    let report = suggestion_report(&response.content, &call.arguments, &text);
                    suggestion = Some(append_missing_links(&report, &log.outputs));
                } else if guard.record_call(call, threshold) {
                    stuck_on = Some(call.name.clone());
                }
            }

            if let Some(content) = suggestion {
                info!(
                    "Command suggested after {} iterations; handing over to the operator",
                    iteration
                );
                return Ok(content);
            }

            if let Some(tool) = stuck_on {
                warn!("Repeated identical calls to {}", tool);
                let instruction = ctx.policy.stuck_instruction(&tool);
                history.add_user(&instruction);
                events.emit(AgentEvent::Intervention(instruction)).await;
            }
        }

        warn!("Native run exhausted {} iterations", ctx.max_iterations);
        Err(Error::IterationBudgetExhausted(ctx.max_iterations))
    }
}

#[async_trait]
impl Agent for NativeAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Native
    }

    fn history(&self) -> &MessageHistory {
        &self.history
    }

    async fn run_with_events(&mut self, message: &str, events: EventSink) -> AgentResult {
        info!("Native run started ({})", self.ctx.provider.model());
        self.history.add_user(message);
        let mut log = RunLog::default();

        match self.drive(message, &mut log, &events).await {
            Ok(content) => {
                events
                    .emit(AgentEvent::Done {
                        content: content.clone(),
                    })
                    .await;
                log.finish(content)
            }
            Err(e) => {
                error!("Native run failed: {}", e);
                let content = self
                    .history
                    .last_assistant_text()
                    .map(String::from)
                    .unwrap_or_else(|| format!("The investigation could not be completed: {}", e));
                events.emit(AgentEvent::Error(e.to_string())).await;
                log.fail(content, &e)
            }
        }
    }
}
