//! ReAct agent - tool use by text parsing
//!
//! For providers without structured function calling. The model writes
//!
//! ```text
//! Thought: ...
//! Action: tool_name
//! Action Input: {"arg": "value"}
//! ```
//!
//! and the loop answers with an `Observation:`. The scratchpad is kept as
//! discrete [`ReactStep`]s and only flattened to text when the prompt is built.

use crate::agent::{Agent, AgentKind};
use crate::context::AgentContext;
use crate::event::{AgentEvent, EventSink};
use crate::history::MessageHistory;
use crate::policy::RepeatGuard;
use crate::report::{append_missing_links, suggestion_report};
use crate::result::{AgentResult, RunLog};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};
use triage_core::{ToolRegistry, SUGGEST_COMMAND};
use triage_foundation::{Error, Result};
use triage_provider::{Message, ToolCall};

/// Consecutive empty replies tolerated before the run is abandoned
const MAX_EMPTY_REPLIES: usize = 2;

// ============================================================================
// Scratchpad
// ============================================================================

/// One entry of the reasoning trace
#[derive(Debug, Clone, PartialEq)]
pub enum ReactStep {
    Thought(String),
    Action { tool: String, input: Value },
    Observation(String),
    /// An answer the loop did not accept
    FinalAnswer(String),
    /// Guidance injected by the loop
    Instruction(String),
}

impl ReactStep {
    pub fn render(&self) -> String {
        match self {
            ReactStep::Thought(t) => format!("Thought: {}", t),
            ReactStep::Action { tool, input } => {
                format!("Action: {}\nAction Input: {}", tool, input)
            }
            ReactStep::Observation(o) => format!("Observation: {}", o),
            ReactStep::FinalAnswer(a) => format!("Final Answer: {}", a),
            ReactStep::Instruction(i) => format!("Instruction: {}", i),
        }
    }
}

/// Flatten steps into the text the model continues from
pub fn render_scratchpad(steps: &[ReactStep]) -> String {
    steps
        .iter()
        .map(ReactStep::render)
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Parser
// ============================================================================

/// A tool invocation parsed from text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAction {
    pub tool: String,
    pub input: Value,
}

/// What one model reply asked for
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReply {
    pub thought: Option<String>,
    pub action: Option<ParsedAction>,
    pub final_answer: Option<String>,
}

impl ParsedReply {
    pub fn is_empty(&self) -> bool {
        self.thought.is_none() && self.action.is_none() && self.final_answer.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Thought,
    Action,
    ActionInput,
    Observation,
    FinalAnswer,
}

const LABELS: &[(&str, Label)] = &[
    ("thought", Label::Thought),
    ("action input", Label::ActionInput),
    ("action", Label::Action),
    ("observation", Label::Observation),
    ("final answer", Label::FinalAnswer),
];

/// Recognize `Label: rest`, tolerating markdown emphasis and list markers
fn split_label(line: &str) -> Option<(Label, &str)> {
    let stripped = line.trim_start().trim_start_matches(['*', '#', '-', '>', ' ']);
    let (head, rest) = stripped.split_once(':')?;
    let head = head.trim().trim_end_matches('*').trim().to_lowercase();
    let label = LABELS
        .iter()
        .find(|(name, _)| *name == head)
        .map(|(_, label)| *label)?;
    Some((label, rest.trim_start_matches('*').trim()))
}

/// Parse a reply into thought, action and final answer.
///
/// Whichever of `Action:` / `Final Answer:` appears first wins. Anything from
/// an `Observation:` line on is ignored: observations come from the loop.
pub fn parse_reply(text: &str) -> ParsedReply {
    let mut sections: Vec<(Option<Label>, String)> = vec![(None, String::new())];

    for line in text.lines() {
        match split_label(line) {
            Some((Label::Observation, _)) => break,
            Some((label, rest)) => sections.push((Some(label), rest.to_string())),
            None => {
                if let Some((_, body)) = sections.last_mut() {
                    if !body.is_empty() {
                        body.push('\n');
                    }
                    body.push_str(line);
                }
            }
        }
    }

    let body = |label: Label| {
        sections
            .iter()
            .find(|(l, _)| *l == Some(label))
            .map(|(_, b)| b.trim().to_string())
    };
    let position = |label: Label| sections.iter().position(|(l, _)| *l == Some(label));

    let thought = body(Label::Thought)
        .or_else(|| sections.first().map(|(_, b)| b.trim().to_string()))
        .filter(|t| !t.is_empty());

    let action_at = position(Label::Action);
    let final_at = position(Label::FinalAnswer);
    let action_first = match (action_at, final_at) {
        (Some(a), Some(f)) => a < f,
        (Some(_), None) => true,
        _ => false,
    };

    let action = action_at.filter(|_| action_first).and_then(|at| {
        let tool = clean_tool_name(&sections[at].1)?;
        let input = sections[at..]
            .iter()
            .find(|(l, _)| *l == Some(Label::ActionInput))
            .map(|(_, raw)| parse_action_input(raw))
            .unwrap_or_else(|| json!({}));
        Some(ParsedAction { tool, input })
    });

    let final_answer = if action.is_some() {
        None
    } else {
        body(Label::FinalAnswer).filter(|a| !a.is_empty())
    };

    ParsedReply {
        thought,
        action,
        final_answer,
    }
}

fn clean_tool_name(raw: &str) -> Option<String> {
    let first = raw.lines().next()?.trim();
    let name = first.split('(').next().unwrap_or(first);
    let name = name.trim().trim_matches(['`', '"', '\'', '*', '[', ']']).trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Arguments for an action.
///
/// A JSON object is used as-is (code fences allowed); empty input is `{}`;
/// anything else becomes `{"query": <raw text>}`.
pub fn parse_action_input(raw: &str) -> Value {
    let text = strip_fences(raw.trim());
    if text.is_empty() {
        return json!({});
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => return Value::Object(map),
        Ok(Value::String(s)) => return query(s),
        _ => {}
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Value::Object(map);
            }
        }
    }

    query(text.trim_matches(['"', '\'']).trim().to_string())
}

fn query(text: String) -> Value {
    let mut map = Map::new();
    map.insert("query".to_string(), Value::String(text));
    Value::Object(map)
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the info string (```json)
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().trim_end_matches("```").trim()
}

// ============================================================================
// Prompt
// ============================================================================

/// System prompt for text-parsed tool use
pub fn build_system_prompt(base: &str, tools: &ToolRegistry) -> String {
    let names = tools.names().join(", ");
    format!(
        r#"{base}

You have access to the following tools:

{tools}

Use exactly this format:

Thought: what you need to find out next
Action: the tool to use, one of [{names}]
Action Input: a JSON object with the tool arguments
Observation: the tool result (written by the system, never by you)
... (Thought / Action / Action Input / Observation may repeat)
Thought: I have enough evidence
Final Answer: the answer for the operator

Request one action per reply and stop writing after its Action Input."#,
        base = base.trim_end(),
        tools = tools.text_description().trim_end(),
        names = names,
    )
}

fn request_block(message: &str, steps: &[ReactStep]) -> String {
    let mut block = format!("Question: {}\n", message);
    if !steps.is_empty() {
        block.push('\n');
        block.push_str(&render_scratchpad(steps));
        block.push('\n');
    }
    block
}

// ============================================================================
// Agent
// ============================================================================

/// Agent for providers that only return text
pub struct ReactAgent {
    ctx: AgentContext,
    system_prompt: String,
    history: MessageHistory,
    steps: Vec<ReactStep>,
}

impl ReactAgent {
    pub fn new(ctx: AgentContext) -> Self {
        let system_prompt = build_system_prompt(&ctx.system_prompt, &ctx.tools);
        Self {
            ctx,
            system_prompt,
            history: MessageHistory::new(),
            steps: Vec::new(),
        }
    }

    /// Trace of the most recent run
    pub fn steps(&self) -> &[ReactStep] {
        &self.steps
    }

    async fn drive(&mut self, message: &str, log: &mut RunLog, events: &EventSink) -> Result<String> {
        let ctx = &self.ctx;
        let steps = &mut self.steps;
        let required = ctx.policy.required_tool_calls(message);
        let threshold = ctx.policy.stuck_threshold();
        let mut guard = RepeatGuard::new();
        let mut empty_replies = 0;

        for iteration in 1..=ctx.max_iterations {
            log.iterations = iteration;
            events.emit(AgentEvent::Thinking { iteration }).await;

            let mut turns = self.history.messages().to_vec();
            turns.push(Message::user(request_block(message, steps)));

            let response = ctx
                .provider
                .complete(&turns, &[], Some(&self.system_prompt))
                .await?;
            events
                .emit(AgentEvent::Usage {
                    input_tokens: response.usage.input_tokens,
                    output_tokens: response.usage.output_tokens,
                })
                .await;

            let reply = response.content.trim();
            if reply.is_empty() {
                empty_replies += 1;
                warn!("Empty ReAct reply ({} in a row)", empty_replies);
                if empty_replies >= MAX_EMPTY_REPLIES {
                    return Err(Error::Agent(format!(
                        "model returned {} empty replies in a row",
                        empty_replies
                    )));
                }
                steps.push(ReactStep::Instruction(
                    "Your reply was empty. Continue with Thought / Action / Action Input, or give the Final Answer."
                        .to_string(),
                ));
                continue;
            }
            empty_replies = 0;
            events.emit(AgentEvent::Text(reply.to_string())).await;

            let parsed = parse_reply(reply);
            debug!("Parsed ReAct reply: {:?}", parsed);

            if let Some(thought) = &parsed.thought {
                steps.push(ReactStep::Thought(thought.clone()));
            }

            // ----------------------------------------------------------------
            // Action
            // ----------------------------------------------------------------
            if let Some(action) = parsed.action {
                let call = ToolCall::new(ToolCall::generate_id(), &action.tool, action.input);
                steps.push(ReactStep::Action {
                    tool: call.name.clone(),
                    input: call.arguments.clone(),
                });

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
                steps.push(ReactStep::Observation(text.clone()));

                if call.name == SUGGEST_COMMAND
                    && outcome.is_success()
                    && ctx.policy.is_satisfied(message, log.tool_calls_made.len())
                {
                    let thought = parsed.thought.as_deref().unwrap_or("");
                    let report = suggestion_report(thought, &call.arguments, &text);
                    info!("Command suggested after {} iterations", iteration);
                    return Ok(append_missing_links(&report, &log.outputs));
                }

                if guard.record_call(&call, threshold) {
                    warn!("Repeated identical ReAct actions on {}", call.name);
                    let instruction = ctx.policy.stuck_instruction(&call.name);
                    steps.push(ReactStep::Instruction(instruction.clone()));
                    events.emit(AgentEvent::Intervention(instruction)).await;
                }
                continue;
            }

            // ----------------------------------------------------------------
            // Final answer (explicit, or a plain reply without labels)
            // ----------------------------------------------------------------
            let answer = parsed
                .final_answer
                .clone()
                .unwrap_or_else(|| reply.to_string());
            let made = log.tool_calls_made.len();

            if ctx.policy.is_satisfied(message, made) {
                info!("ReAct run finished after {} iterations, {} tool calls", iteration, made);
                return Ok(append_missing_links(&answer, &log.outputs));
            }

            info!("Answer rejected: {} of {} required tool calls", made, required);
            if parsed.final_answer.is_some() {
                steps.push(ReactStep::FinalAnswer(answer));
            }
            let instruction = format!(
                "{} Respond with Thought / Action / Action Input.",
                ctx.policy.continue_instruction(made, required)
            );
            steps.push(ReactStep::Instruction(instruction.clone()));
            events.emit(AgentEvent::Intervention(instruction)).await;
        }

        warn!("ReAct run exhausted {} iterations", ctx.max_iterations);
        Err(Error::IterationBudgetExhausted(ctx.max_iterations))
    }
}

#[async_trait]
impl Agent for ReactAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::React
    }

    fn history(&self) -> &MessageHistory {
        &self.history
    }

    async fn run_with_events(&mut self, message: &str, events: EventSink) -> AgentResult {
        info!("ReAct run started ({})", self.ctx.provider.model());
        self.steps.clear();
        let mut log = RunLog::default();
        let outcome = self.drive(message, &mut log, &events).await;

        // Only the question and the answer enter the conversation; the trace stays in `steps`
        self.history.add_user(message);
        match outcome {
            Ok(content) => {
                self.history.add_assistant(&content);
                events
                    .emit(AgentEvent::Done {
                        content: content.clone(),
                    })
                    .await;
                log.finish(content)
            }
            Err(e) => {
                error!("ReAct run failed: {}", e);
                let content = self
                    .steps
                    .iter()
                    .rev()
                    .find_map(|s| match s {
                        ReactStep::FinalAnswer(a) => Some(a.clone()),
                        _ => None,
                    })
                    .unwrap_or_else(|| format!("The investigation could not be completed: {}", e));
                self.history.add_assistant(&content);
                events.emit(AgentEvent::Error(e.to_string())).await;
                log.fail(content, &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_with_object_input() {
        let parsed = parse_reply(
            "Thought: I should look for known issues\nAction: search_knowledge\nAction Input: {\"query\":\"x\"}",
        );
        assert_eq!(parsed.thought.as_deref(), Some("I should look for known issues"));
        assert_eq!(
            parsed.action,
            Some(ParsedAction {
                tool: "search_knowledge".into(),
                input: json!({"query": "x"})
            })
        );
        assert_eq!(parsed.final_answer, None);
    }

    #[test]
    fn test_non_object_input_becomes_query() {
        let parsed = parse_reply("Action: search_knowledge\nAction Input: apache 502 errors");
        assert_eq!(
            parsed.action.unwrap().input,
            json!({"query": "apache 502 errors"})
        );

        assert_eq!(parse_action_input("\"disk full\""), json!({"query": "disk full"}));
        assert_eq!(parse_action_input("42"), json!({"query": "42"}));
        assert_eq!(parse_action_input("   "), json!({}));
    }

    #[test]
    fn test_fenced_and_embedded_json() {
        let parsed = parse_reply(
            "Thought: check metrics\nAction: `query_metrics`\nAction Input:\n```json\n{\"query\": \"up{job=\\\"web\\\"}\", \"minutes\": 15}\n```",
        );
        let action = parsed.action.unwrap();
        assert_eq!(action.tool, "query_metrics");
        assert_eq!(action.input["minutes"], 15);

        assert_eq!(
            parse_action_input("arguments: {\"service\": \"apache\"} (from the runbook)"),
            json!({"service": "apache"})
        );
    }

    #[test]
    fn test_hallucinated_observation_is_ignored() {
        let parsed = parse_reply(
            "Action: get_runbook\nAction Input: {\"service\": \"apache\"}\nObservation: restart it\nFinal Answer: restart apache",
        );
        assert_eq!(parsed.action.unwrap().tool, "get_runbook");
        assert_eq!(parsed.final_answer, None);
    }

    #[test]
    fn test_final_answer() {
        let parsed = parse_reply("Thought: I know enough\nFinal Answer: The disk on db-1 is full.\nClean /var/log.");
        assert!(parsed.action.is_none());
        assert_eq!(
            parsed.final_answer.as_deref(),
            Some("The disk on db-1 is full.\nClean /var/log.")
        );
    }

    #[test]
    fn test_markdown_labels_and_tool_name_cleanup() {
        let parsed = parse_reply("**Thought:** look it up\n**Action:** \"get_runbook\"\n**Action Input:** {\"service\": \"nginx\"}");
        let action = parsed.action.unwrap();
        assert_eq!(action.tool, "get_runbook");
        assert_eq!(action.input, json!({"service": "nginx"}));

        let parsed = parse_reply("Action: list_alerts()");
        assert_eq!(
            parsed.action,
            Some(ParsedAction {
                tool: "list_alerts".into(),
                input: json!({})
            })
        );
    }

    #[test]
    fn test_unlabelled_text_is_a_thought() {
        let parsed = parse_reply("The service looks healthy overall.");
        assert_eq!(parsed.thought.as_deref(), Some("The service looks healthy overall."));
        assert!(parsed.action.is_none());
        assert!(parsed.final_answer.is_none());
        assert!(parse_reply("").is_empty());
    }

    #[test]
    fn test_scratchpad_rendering() {
        let steps = vec![
            ReactStep::Thought("check the runbook".into()),
            ReactStep::Action {
                tool: "get_runbook".into(),
                input: json!({"service": "apache"}),
            },
            ReactStep::Observation("# Apache".into()),
            ReactStep::Instruction("keep going".into()),
        ];
        assert_eq!(
            render_scratchpad(&steps),
            "Thought: check the runbook\nAction: get_runbook\nAction Input: {\"service\":\"apache\"}\nObservation: # Apache\nInstruction: keep going"
        );
        let block = request_block("why is web-1 down?", &steps);
        assert!(block.starts_with("Question: why is web-1 down?\n\nThought:"));
    }
}
