use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Character budget kept per search item's `content` field. Bounds memory,
/// storage and downstream render cost.
pub const KEPT_SEARCH_CONTENT_CHARS: usize = 3_000;

/// Result shape produced by search-capable tools. Recognized structurally
/// (duck-typed) by the stream reducer to apply content truncation; results
/// of any other shape pass through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub code: i64,
    pub status: i64,
    pub data: Vec<SearchItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    pub usage: SearchItemUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItemUsage {
    pub tokens: u64,
}

impl SearchResults {
    /// Structural check: does this value match the search-result shape?
    pub fn matches(value: &Value) -> bool {
        serde_json::from_value::<SearchResults>(value.clone()).is_ok()
    }
}

fn truncate_chars(s: &str, budget: usize) -> Option<String> {
    let mut indices = s.char_indices();
    match indices.nth(budget) {
        Some((byte_pos, _)) => Some(s[..byte_pos].to_string()),
        None => None,
    }
}

/// If `value` matches the search-result shape, return a copy with each
/// item's `content` truncated to [`KEPT_SEARCH_CONTENT_CHARS`]. Mutates a
/// clone of the raw value so provider fields beyond the schema survive.
pub fn truncate_search_content(value: &Value) -> Option<Value> {
    if !SearchResults::matches(value) {
        return None;
    }

    let mut truncated = value.clone();
    if let Some(items) = truncated.get_mut("data").and_then(Value::as_array_mut) {
        for item in items {
            if let Some(Value::String(content)) = item.get_mut("content") {
                if let Some(cut) = truncate_chars(content, KEPT_SEARCH_CONTENT_CHARS) {
                    *content = cut;
                }
            }
        }
    }
    Some(truncated)
}
