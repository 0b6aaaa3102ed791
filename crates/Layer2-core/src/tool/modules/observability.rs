//! Observability module - metrics, logs, alerts
//!
//! `HttpObservabilityBackend` speaks the Prometheus HTTP API
//! (`/api/v1/query_range`, `/api/v1/alerts`) and Loki
//! (`/loki/api/v1/query_range`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use triage_foundation::{Error, ObservabilitySettings, Result};

use crate::tool::args::{optional_str, optional_u64, required_str};
use crate::tool::{ToolCategory, ToolDefinition, ToolModule, ToolParameter};

const DEFAULT_WINDOW_MINUTES: u64 = 30;
const MAX_WINDOW_MINUTES: u64 = 24 * 60;
const DEFAULT_LOG_LIMIT: u64 = 50;
const MAX_LOG_LIMIT: u64 = 500;
const MAX_SERIES_SHOWN: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub labels: BTreeMap<String, String>,
    /// (unix seconds, value)
    pub points: Vec<(f64, f64)>,
}

impl MetricSeries {
    fn summary(&self) -> String {
        let values: Vec<f64> = self.points.iter().map(|(_, v)| *v).filter(|v| v.is_finite()).collect();
        let labels = render_labels(&self.labels);
        if values.is_empty() {
            return format!("{}: no samples", labels);
        }
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        let latest = values[values.len() - 1];
        format!(
            "{}: latest={} min={} max={} avg={} ({} samples)",
            labels,
            fmt_value(latest),
            fmt_value(min),
            fmt_value(max),
            fmt_value(avg),
            values.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub timestamp: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub name: String,
    pub state: String,
    pub severity: Option<String>,
    pub summary: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub active_at: Option<String>,
}

/// Read-only access to a metrics/logs/alerts stack
#[async_trait]
pub trait ObservabilityBackend: Send + Sync {
    async fn query_metrics(&self, query: &str, window: Duration) -> Result<Vec<MetricSeries>>;

    async fn query_logs(&self, query: &str, limit: usize, window: Duration) -> Result<Vec<LogLine>>;

    async fn list_alerts(&self) -> Result<Vec<Alert>>;
}

fn render_labels(labels: &BTreeMap<String, String>) -> String {
    if labels.is_empty() {
        return "{}".to_string();
    }
    let inner = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", inner)
}

fn fmt_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{:.3}", v)
    }
}

// ============================================================================
// Wire parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    status: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

fn unwrap_envelope(source: &str, body: &str) -> Result<Value> {
    let envelope: ApiEnvelope = serde_json::from_str(body)
        .map_err(|e| Error::Http(format!("{}: invalid response: {}", source, e)))?;
    if envelope.status != "success" {
        return Err(Error::Http(format!(
            "{}: {}",
            source,
            envelope.error.unwrap_or(envelope.status)
        )));
    }
    Ok(envelope.data)
}

fn label_map(value: &Value) -> BTreeMap<String, String> {
    value
        .as_object()
        .map(|m| {
            m.iter()
                .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_matrix(body: &str) -> Result<Vec<MetricSeries>> {
    let data = unwrap_envelope("prometheus", body)?;
    let series = data["result"].as_array().cloned().unwrap_or_default();

    Ok(series
        .iter()
        .map(|s| {
            // Range queries return `values`, instant queries a single `value`
            let raw: Vec<Value> = match (&s["values"], &s["value"]) {
                (Value::Array(values), _) => values.clone(),
                (_, Value::Array(_)) => vec![s["value"].clone()],
                _ => Vec::new(),
            };
            let points = raw
                .iter()
                .filter_map(|p| {
                    let ts = p.get(0)?.as_f64()?;
                    let v = p.get(1)?.as_str()?.parse::<f64>().ok()?;
                    Some((ts, v))
                })
                .collect();
            MetricSeries {
                labels: label_map(&s["metric"]),
                points,
            }
        })
        .collect())
}

fn parse_streams(body: &str) -> Result<Vec<LogLine>> {
    let data = unwrap_envelope("loki", body)?;
    let streams = data["result"].as_array().cloned().unwrap_or_default();

    let mut lines: Vec<LogLine> = streams
        .iter()
        .flat_map(|stream| {
            let labels = label_map(&stream["stream"]);
            stream["values"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter_map(move |entry| {
                    let nanos: i64 = entry.get(0)?.as_str()?.parse().ok()?;
                    let line = entry.get(1)?.as_str()?.to_string();
                    Some(LogLine {
                        timestamp: DateTime::<Utc>::from_timestamp(
                            nanos.div_euclid(1_000_000_000),
                            nanos.rem_euclid(1_000_000_000) as u32,
                        ),
                        labels: labels.clone(),
                        line,
                    })
                })
        })
        .collect();

    // Newest first across streams
    lines.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(lines)
}

fn parse_alerts(body: &str) -> Result<Vec<Alert>> {
    let data = unwrap_envelope("prometheus", body)?;
    let alerts = data["alerts"].as_array().cloned().unwrap_or_default();

    Ok(alerts
        .iter()
        .map(|a| {
            let mut labels = label_map(&a["labels"]);
            let name = labels.remove("alertname").unwrap_or_else(|| "unnamed".to_string());
            let severity = labels.remove("severity");
            let summary = a["annotations"]["summary"]
                .as_str()
                .or_else(|| a["annotations"]["description"].as_str())
                .map(String::from);
            Alert {
                name,
                state: a["state"].as_str().unwrap_or("unknown").to_string(),
                severity,
                summary,
                labels,
                active_at: a["activeAt"].as_str().map(String::from),
            }
        })
        .collect())
}

// ============================================================================
// HTTP backend
// ============================================================================

pub struct HttpObservabilityBackend {
    client: reqwest::Client,
    prometheus_url: Option<String>,
    loki_url: Option<String>,
}

impl HttpObservabilityBackend {
    pub fn new(prometheus_url: Option<String>, loki_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            prometheus_url: prometheus_url.map(|u| u.trim_end_matches('/').to_string()),
            loki_url: loki_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    pub fn from_settings(settings: &ObservabilitySettings) -> Result<Self> {
        Self::new(settings.prometheus_url.clone(), settings.loki_url.clone())
    }

    fn prometheus(&self) -> Result<&str> {
        self.prometheus_url
            .as_deref()
            .ok_or_else(|| Error::Config("prometheusUrl is not configured".to_string()))
    }

    fn loki(&self) -> Result<&str> {
        self.loki_url
            .as_deref()
            .ok_or_else(|| Error::Config("lokiUrl is not configured".to_string()))
    }

    async fn get(&self, url: String, query: &[(&str, String)]) -> Result<String> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", url, e)))?;

        // Prometheus reports query errors as 4xx with a JSON envelope
        if !status.is_success() && !body.trim_start().starts_with('{') {
            return Err(Error::Http(format!("{}: HTTP {}", url, status)));
        }
        Ok(body)
    }
}

#[async_trait]
impl ObservabilityBackend for HttpObservabilityBackend {
    async fn query_metrics(&self, query: &str, window: Duration) -> Result<Vec<MetricSeries>> {
        let end = Utc::now().timestamp();
        let start = end - window.as_secs() as i64;
        // ~60 points per series
        let step = (window.as_secs() / 60).max(15);

        let body = self
            .get(
                format!("{}/api/v1/query_range", self.prometheus()?),
                &[
                    ("query", query.to_string()),
                    ("start", start.to_string()),
                    ("end", end.to_string()),
                    ("step", step.to_string()),
                ],
            )
            .await?;
        parse_matrix(&body)
    }

    async fn query_logs(&self, query: &str, limit: usize, window: Duration) -> Result<Vec<LogLine>> {
        let end = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let start = end - (window.as_nanos() as i64);

        let body = self
            .get(
                format!("{}/loki/api/v1/query_range", self.loki()?),
                &[
                    ("query", query.to_string()),
                    ("limit", limit.to_string()),
                    ("start", start.to_string()),
                    ("end", end.to_string()),
                    ("direction", "backward".to_string()),
                ],
            )
            .await?;
        let mut lines = parse_streams(&body)?;
        lines.truncate(limit);
        Ok(lines)
    }

    async fn list_alerts(&self) -> Result<Vec<Alert>> {
        let body = self
            .get(format!("{}/api/v1/alerts", self.prometheus()?), &[])
            .await?;
        parse_alerts(&body)
    }
}

// ============================================================================
// Module
// ============================================================================

pub struct ObservabilityModule {
    backend: Arc<dyn ObservabilityBackend>,
    definitions: Vec<ToolDefinition>,
}

impl ObservabilityModule {
    pub fn new(backend: Arc<dyn ObservabilityBackend>) -> Self {
        let minutes = || {
            ToolParameter::integer("minutes", "Look-back window in minutes", false)
                .with_default(json!(DEFAULT_WINDOW_MINUTES))
        };

        let definitions = vec![
            ToolDefinition::new(
                "query_metrics",
                "Run a PromQL query over a recent time window and summarize each series",
                ToolCategory::Observability,
            )
            .param(ToolParameter::string(
                "query",
                "PromQL expression, e.g. rate(http_requests_total{job=\"apache\"}[5m])",
                true,
            ))
            .param(minutes()),
            ToolDefinition::new(
                "query_logs",
                "Run a LogQL query and return the most recent matching log lines",
                ToolCategory::Observability,
            )
            .param(ToolParameter::string(
                "query",
                "LogQL selector, e.g. {job=\"apache\"} |= \"error\"",
                true,
            ))
            .param(
                ToolParameter::integer("limit", "Maximum number of lines", false)
                    .with_default(json!(DEFAULT_LOG_LIMIT)),
            )
            .param(minutes()),
            ToolDefinition::new(
                "list_alerts",
                "List alerts currently known to the alerting system",
                ToolCategory::Observability,
            )
            .param(
                ToolParameter::string("state", "Only alerts in this state", false)
                    .with_enum(&["firing", "pending", "inactive"]),
            ),
        ];

        Self {
            backend,
            definitions,
        }
    }

    fn window(args: &Value) -> Duration {
        let minutes = optional_u64(args, "minutes")
            .unwrap_or(DEFAULT_WINDOW_MINUTES)
            .clamp(1, MAX_WINDOW_MINUTES);
        Duration::from_secs(minutes * 60)
    }

    async fn query_metrics(&self, args: &Value) -> Result<String> {
        let query = required_str(args, "query")?;
        let window = Self::window(args);
        let series = self.backend.query_metrics(query, window).await?;

        if series.is_empty() {
            return Ok(format!(
                "No series returned for '{}' over the last {} minutes.",
                query,
                window.as_secs() / 60
            ));
        }

        let mut out = format!(
            "{} series for '{}' over the last {} minutes:",
            series.len(),
            query,
            window.as_secs() / 60
        );
        for s in series.iter().take(MAX_SERIES_SHOWN) {
            out.push_str("\n- ");
            out.push_str(&s.summary());
        }
        if series.len() > MAX_SERIES_SHOWN {
            out.push_str(&format!("\n... {} more series", series.len() - MAX_SERIES_SHOWN));
        }
        Ok(out)
    }

    async fn query_logs(&self, args: &Value) -> Result<String> {
        let query = required_str(args, "query")?;
        let limit = optional_u64(args, "limit")
            .unwrap_or(DEFAULT_LOG_LIMIT)
            .clamp(1, MAX_LOG_LIMIT) as usize;
        let window = Self::window(args);
        let lines = self.backend.query_logs(query, limit, window).await?;

        if lines.is_empty() {
            return Ok(format!(
                "No log lines matched '{}' in the last {} minutes.",
                query,
                window.as_secs() / 60
            ));
        }

        let mut out = format!("{} log line(s) for '{}' (newest first):", lines.len(), query);
        for line in &lines {
            let ts = line
                .timestamp
                .map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!("\n[{}] {}", ts, line.line));
        }
        Ok(out)
    }

    async fn list_alerts(&self, args: &Value) -> Result<String> {
        let state = optional_str(args, "state").map(str::to_lowercase);
        let alerts: Vec<Alert> = self
            .backend
            .list_alerts()
            .await?
            .into_iter()
            .filter(|a| state.as_deref().map_or(true, |s| a.state.eq_ignore_ascii_case(s)))
            .collect();

        if alerts.is_empty() {
            return Ok(match state {
                Some(s) => format!("No {} alerts.", s),
                None => "No alerts.".to_string(),
            });
        }

        let mut out = format!("{} alert(s):", alerts.len());
        for alert in &alerts {
            out.push_str(&format!("\n- [{}] {}", alert.state, alert.name));
            if let Some(severity) = &alert.severity {
                out.push_str(&format!(" (severity={})", severity));
            }
            if !alert.labels.is_empty() {
                out.push_str(&format!(" {}", render_labels(&alert.labels)));
            }
            if let Some(summary) = &alert.summary {
                out.push_str(&format!(": {}", summary));
            }
            if let Some(since) = &alert.active_at {
                out.push_str(&format!(" since {}", since));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ToolModule for ObservabilityModule {
    fn name(&self) -> &str {
        "observability"
    }

    fn read_only(&self) -> bool {
        true
    }

    fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    async fn execute(&self, tool: &str, args: Value) -> Result<String> {
        match tool {
            "query_metrics" => self.query_metrics(&args).await,
            "query_logs" => self.query_logs(&args).await,
            "list_alerts" => self.list_alerts(&args).await,
            other => Err(Error::ToolNotFound(other.to_string())),
        }
    }
}
