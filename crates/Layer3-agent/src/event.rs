//! Progress events emitted while an agent runs

use tokio::sync::mpsc;

/// Events emitted by an agent during a run
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A model call is about to be made
    Thinking { iteration: usize },

    /// Text produced by the model
    Text(String),

    ToolStart {
        tool_name: String,
        tool_call_id: String,
    },

    ToolComplete {
        tool_name: String,
        tool_call_id: String,
        result: String,
        success: bool,
    },

    /// The loop injected an instruction (insufficient evidence, repeated calls)
    Intervention(String),

    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },

    /// Run finished with this answer
    Done { content: String },

    Error(String),
}

/// Optional event channel. Sending never fails the run.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<AgentEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<AgentEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink that drops everything
    pub fn none() -> Self {
        Self::default()
    }

    pub async fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }
}

impl AgentEvent {
    /// One line for console streaming, `None` for events not worth showing
    pub fn render(&self) -> Option<String> {
        match self {
            AgentEvent::Thinking { .. } | AgentEvent::Usage { .. } => None,
            AgentEvent::Text(text) if text.trim().is_empty() => None,
            AgentEvent::Text(text) => Some(format!("{}\n", text.trim_end())),
            AgentEvent::ToolStart { tool_name, .. } => Some(format!("[tool] {}\n", tool_name)),
            AgentEvent::ToolComplete {
                tool_name, success, ..
            } => Some(format!(
                "[tool] {} {}\n",
                tool_name,
                if *success { "done" } else { "failed" }
            )),
            AgentEvent::Intervention(_) => Some("[agent] gathering more evidence\n".to_string()),
            AgentEvent::Done { content } => Some(content.clone()),
            AgentEvent::Error(e) => Some(format!("Error: {}\n", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_delivers_and_tolerates_closed_channel() {
        tokio_test::block_on(async {
            let (tx, mut rx) = mpsc::channel(4);
            let sink = EventSink::new(tx);
            sink.emit(AgentEvent::Thinking { iteration: 1 }).await;
            assert_eq!(rx.recv().await, Some(AgentEvent::Thinking { iteration: 1 }));

            drop(rx);
            sink.emit(AgentEvent::Text("ignored".into())).await;
            EventSink::none().emit(AgentEvent::Text("ignored".into())).await;
        });
    }

    #[test]
    fn test_render() {
        assert_eq!(AgentEvent::Thinking { iteration: 1 }.render(), None);
        assert_eq!(
            AgentEvent::ToolStart {
                tool_name: "get_runbook".into(),
                tool_call_id: "c1".into()
            }
            .render()
            .as_deref(),
            Some("[tool] get_runbook\n")
        );
        assert_eq!(
            AgentEvent::Done { content: "answer".into() }.render().as_deref(),
            Some("answer")
        );
    }
}
