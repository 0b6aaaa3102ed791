//! Final answer assembly
//!
//! Reference links found in tool output (runbook URLs, dashboards) are carried
//! into the answer when the model forgot them, and an accepted command
//! suggestion is rendered for the operator.

use serde_json::Value;

/// Links appended to one answer
const MAX_REFERENCES: usize = 10;

/// http(s) URLs in order of first appearance, without duplicates
pub fn extract_links(text: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let mut rest = text;

    while let Some(start) = find_scheme(rest) {
        let candidate = &rest[start..];
        let end = candidate
            .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '\'' | '`' | ')' | ']'))
            .unwrap_or(candidate.len());
        let link = candidate[..end].trim_end_matches(['.', ',', ';', ':', '!', '?']);

        if link.len() > "https://".len() && !links.iter().any(|l| l == link) {
            links.push(link.to_string());
        }
        rest = &candidate[end..];
    }

    links
}

fn find_scheme(text: &str) -> Option<usize> {
    match (text.find("http://"), text.find("https://")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Append links from `sources` that `content` does not already mention
pub fn append_missing_links(content: &str, sources: &[String]) -> String {
    let mut missing: Vec<String> = Vec::new();
    for source in sources {
        for link in extract_links(source) {
            if !content.contains(&link) && !missing.contains(&link) {
                missing.push(link);
            }
        }
    }

    if missing.is_empty() {
        return content.to_string();
    }

    let mut out = content.trim_end().to_string();
    out.push_str("\n\nReferences:\n");
    for link in missing.iter().take(MAX_REFERENCES) {
        out.push_str("- ");
        out.push_str(link);
        out.push('\n');
    }
    out
}

/// Operator-facing text for an accepted `suggest_command` call
pub fn suggestion_report(model_text: &str, arguments: &Value, acknowledgment: &str) -> String {
    let field = |key: &str| {
        arguments
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let mut out = String::new();
    let model_text = model_text.trim();
    if !model_text.is_empty() {
        out.push_str(model_text);
        out.push_str("\n\n");
    }

    match field("server") {
        Some(server) => out.push_str(&format!("Suggested command for {}:\n\n", server)),
        None => out.push_str("Suggested command:\n\n"),
    }
    out.push_str(&format!("    {}\n", field("command").unwrap_or("")));

    if let Some(reason) = field("reason") {
        out.push_str(&format!("\nReason: {}\n", reason));
    }
    for warning in acknowledgment
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("Warning:"))
    {
        out.push('\n');
        out.push_str(warning);
        out.push('\n');
    }

    out.push_str("\nThe command has not been run. Execute it manually and share the output to continue.");
    out
}
