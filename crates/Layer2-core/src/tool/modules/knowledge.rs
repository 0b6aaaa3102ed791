//! Knowledge module - runbooks and keyword search

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use triage_foundation::{Error, JsonStore, Result};

use crate::tool::args::{optional_u64, required_str};
use crate::tool::{ToolCategory, ToolDefinition, ToolModule, ToolParameter};

const DEFAULT_SEARCH_LIMIT: u64 = 5;
const MAX_SEARCH_LIMIT: u64 = 20;
const EXCERPT_CHARS: usize = 240;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Runbook {
    pub service: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub content: String,
    /// Reference URLs
    #[serde(default)]
    pub links: Vec<String>,
}

impl Runbook {
    fn render(&self) -> String {
        let mut out = format!("# {} (service: {})", self.title, self.service);
        if !self.steps.is_empty() {
            out.push_str("\n\nSteps:");
            for (i, step) in self.steps.iter().enumerate() {
                out.push_str(&format!("\n{}. {}", i + 1, step));
            }
        }
        if !self.content.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.content);
        }
        if !self.links.is_empty() {
            out.push_str("\n\nReferences:");
            for link in &self.links {
                out.push_str(&format!("\n- {}", link));
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeHit {
    pub title: String,
    pub service: String,
    pub score: usize,
    pub excerpt: String,
    pub links: Vec<String>,
}

/// Runbook lookup and free-text search
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn runbook(&self, service: &str) -> Result<Option<Runbook>>;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeHit>>;
}

// ============================================================================
// JSON-file knowledge base
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct JsonKnowledgeBase {
    runbooks: Vec<Runbook>,
}

impl JsonKnowledgeBase {
    pub fn new(runbooks: Vec<Runbook>) -> Self {
        Self { runbooks }
    }

    /// A missing file gives an empty knowledge base
    pub fn load(store: &JsonStore, filename: &str) -> Result<Self> {
        match store.load_optional::<Vec<Runbook>>(filename)? {
            Some(runbooks) => {
                debug!("Loaded {} runbooks from {}", runbooks.len(), filename);
                Ok(Self::new(runbooks))
            }
            None => {
                warn!(
                    "No runbook file at {}",
                    store.file_path(filename).display()
                );
                Ok(Self::default())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.runbooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runbooks.is_empty()
    }

    fn score(runbook: &Runbook, terms: &[String]) -> usize {
        let title = runbook.title.to_lowercase();
        let service = runbook.service.to_lowercase();
        let body = format!("{}\n{}", runbook.content, runbook.steps.join("\n")).to_lowercase();

        terms
            .iter()
            .map(|term| {
                let mut score = 0;
                if title.contains(term.as_str()) {
                    score += 3;
                }
                if service.contains(term.as_str()) {
                    score += 3;
                }
                if runbook.tags.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                    score += 2;
                }
                score + body.matches(term.as_str()).count().min(5)
            })
            .sum()
    }
}

fn terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .collect()
}

fn excerpt(runbook: &Runbook) -> String {
    let source = if runbook.content.is_empty() {
        runbook.steps.join(" ")
    } else {
        runbook.content.clone()
    };
    let mut text: String = source.chars().take(EXCERPT_CHARS).collect();
    if source.chars().count() > EXCERPT_CHARS {
        text.push_str("...");
    }
    text
}

#[async_trait]
impl KnowledgeBase for JsonKnowledgeBase {
    /// Exact service match first, then a name containing or contained in the query
    async fn runbook(&self, service: &str) -> Result<Option<Runbook>> {
        let wanted = service.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }

        let exact = self
            .runbooks
            .iter()
            .find(|r| r.service.to_lowercase() == wanted);
        let fuzzy = || {
            self.runbooks.iter().find(|r| {
                let name = r.service.to_lowercase();
                !name.is_empty() && (name.contains(&wanted) || wanted.contains(&name))
            })
        };

        Ok(exact.or_else(fuzzy).cloned())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeHit>> {
        let terms = terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<KnowledgeHit> = self
            .runbooks
            .iter()
            .filter_map(|r| {
                let score = Self::score(r, &terms);
                (score > 0).then(|| KnowledgeHit {
                    title: r.title.clone(),
                    service: r.service.clone(),
                    score,
                    excerpt: excerpt(r),
                    links: r.links.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.title.cmp(&b.title)));
        hits.truncate(limit);
        Ok(hits)
    }
}

// ============================================================================
// Module
// ============================================================================

pub struct KnowledgeModule {
    base: Arc<dyn KnowledgeBase>,
    definitions: Vec<ToolDefinition>,
}

impl KnowledgeModule {
    pub fn new(base: Arc<dyn KnowledgeBase>) -> Self {
        let definitions = vec![
            ToolDefinition::new(
                "get_runbook",
                "Fetch the operational runbook for a service (restart, recovery and escalation steps)",
                ToolCategory::Knowledge,
            )
            .param(ToolParameter::string(
                "service",
                "Service name, e.g. apache, nginx, postgres",
                true,
            )),
            ToolDefinition::new(
                "search_knowledge",
                "Search runbooks and past incident notes by keywords",
                ToolCategory::Knowledge,
            )
            .param(ToolParameter::string("query", "Keywords describing the problem", true))
            .param(
                ToolParameter::integer("limit", "Maximum number of results", false)
                    .with_default(json!(DEFAULT_SEARCH_LIMIT)),
            ),
        ];

        Self { base, definitions }
    }

    async fn get_runbook(&self, args: &Value) -> Result<String> {
        let service = required_str(args, "service")?;
        Ok(match self.base.runbook(service).await? {
            Some(runbook) => runbook.render(),
            None => format!("No runbook found for service '{}'.", service),
        })
    }

    async fn search_knowledge(&self, args: &Value) -> Result<String> {
        let query = required_str(args, "query")?;
        let limit = optional_u64(args, "limit")
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT) as usize;

        let hits = self.base.search(query, limit).await?;
        if hits.is_empty() {
            return Ok(format!("No knowledge base entries matched '{}'.", query));
        }

        let mut out = format!("{} result(s) for '{}':", hits.len(), query);
        for (i, hit) in hits.iter().enumerate() {
            out.push_str(&format!(
                "\n\n{}. {} [service: {}, score: {}]\n{}",
                i + 1,
                hit.title,
                hit.service,
                hit.score,
                hit.excerpt
            ));
            for link in &hit.links {
                out.push_str(&format!("\n   {}", link));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ToolModule for KnowledgeModule {
    fn name(&self) -> &str {
        "knowledge"
    }

    fn read_only(&self) -> bool {
        true
    }

    fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    async fn execute(&self, tool: &str, args: Value) -> Result<String> {
        match tool {
            "get_runbook" => self.get_runbook(&args).await,
            "search_knowledge" => self.search_knowledge(&args).await,
            other => Err(Error::ToolNotFound(other.to_string())),
        }
    }
}
