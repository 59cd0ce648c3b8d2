use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::registry::Tool;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Web search backed by the Jina reader API. Responses carry the
/// search-result shape (`{code, status, data: [...]}`), which the stream
/// reducer recognizes to truncate page content before storing.
pub struct JinaSearchTool {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl JinaSearchTool {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, "https://s.jina.ai")
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .context("Failed to build search HTTP client")?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Tool for JinaSearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web and return page titles, descriptions and extracted content for a query."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "q": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["q"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let query = args
            .get("q")
            .and_then(Value::as_str)
            .context("search: missing `q` argument")?;

        tracing::info!(query, "running web search");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("q", query)])
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .header("X-With-Favicons", "true")
            .send()
            .await
            .context("Search request failed")?
            .error_for_status()
            .context("Search API returned an error status")?;

        let body: Value = response
            .json()
            .await
            .context("Failed to parse search response")?;
        Ok(body)
    }
}
