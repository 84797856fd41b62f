use std::collections::HashMap;

use serde_json::Value;
use xq_core::{Error, Result};

/// One model-provided result, before tag validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub summary_zh: String,
    pub tags: Vec<String>,
}

/// 1-based position within the batch -> result. Indices are taken as given,
/// so lookups must stay within the batch bounds.
pub type BatchSummaryResult = HashMap<usize, BatchSummary>;

/// Removes a surrounding Markdown code fence (with optional language tag).
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.split_once('\n') {
        Some((lang, body)) if lang.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body,
        _ => rest,
    };
    let body = match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim()
}

pub fn parse_batch_response(text: &str) -> Result<BatchSummaryResult> {
    let body = strip_code_fence(text);
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(err) => outermost_json(body)
            .and_then(|slice| serde_json::from_str::<Value>(slice).ok())
            .ok_or_else(|| Error::Parse(format!("response is not JSON: {}", err)))?,
    };

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("articles")
            .or_else(|| map.get("results"))
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Parse("response object has no articles array".to_string()))?,
        _ => return Err(Error::Parse("response is neither an array nor an object".to_string())),
    };

    let mut result = BatchSummaryResult::new();
    for item in items {
        let Some(index) = item.get("index").and_then(index_value) else {
            tracing::debug!("Skipping summary item without a usable index: {}", item);
            continue;
        };
        let summary_zh = item
            .get("summary_zh")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        let tags = match item.get("tags") {
            Some(Value::Array(tags)) => tags
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(tag)) => vec![tag.clone()],
            _ => Vec::new(),
        };
        result.insert(index, BatchSummary { summary_zh, tags });
    }
    Ok(result)
}

fn index_value(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The widest `{...}` or `[...]` slice, for replies with prose around the JSON.
fn outermost_json(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c == '{' || c == '[')?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
