//! Web search tool backed by the Brave Search API.

use std::time::Duration;

use async_trait::async_trait;
use countbot_core::error::ToolError;
use countbot_core::schema::ParameterSchema;
use countbot_core::tool::Tool;
use serde_json::Value;
use tracing::{info, warn};

pub const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
const MAX_COUNT: usize = 10;

pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(api_key: Option<String>, max_results: usize) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ToolError::failed("web_search", e))?;
        Ok(Self {
            client,
            endpoint: BRAVE_ENDPOINT.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            max_results: max_results.clamp(1, MAX_COUNT),
        })
    }

    /// Send queries somewhere other than the public Brave API.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web using Brave Search API. Returns titles, URLs, and snippets."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
            .required_property("query", ParameterSchema::string().describe("Search query"))
            .property(
                "count",
                ParameterSchema::integer()
                    .min(1.0)
                    .max(MAX_COUNT as f64)
                    .describe("Number of results (1-10)"),
            )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = arguments["query"].as_str().unwrap_or_default();
        if query.is_empty() {
            return Ok("Error: Query parameter is required".into());
        }
        let Some(api_key) = &self.api_key else {
            return Ok("Error: BRAVE_API_KEY not configured".into());
        };
        let count = arguments["count"]
            .as_u64()
            .map_or(self.max_results, |n| (n as usize).clamp(1, MAX_COUNT));

        info!(query = %query, count, "Searching web");
        let count_param = count.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("count", count_param.as_str())])
            .header(reqwest::header::ACCEPT, "application/json")
            .header("X-Subscription-Token", api_key)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        let body: Value = match response {
            Ok(r) => r.json().await.map_err(|e| ToolError::failed("web_search", e))?,
            Err(e) => {
                warn!(query = %query, error = %e, "Web search failed");
                return Err(ToolError::failed("web_search", e));
            }
        };

        let results = body["web"]["results"].as_array().map(Vec::as_slice).unwrap_or_default();
        if results.is_empty() {
            return Ok(format!("No results for: {query}"));
        }

        let mut lines = vec![format!("Results for: {query}\n")];
        for (i, item) in results.iter().take(count).enumerate() {
            let title = item["title"].as_str().unwrap_or_default();
            let url = item["url"].as_str().unwrap_or_default();
            lines.push(format!("{}. {title}\n   {url}", i + 1));
            if let Some(snippet) = item["description"].as_str().filter(|s| !s.is_empty()) {
                lines.push(format!("   {snippet}"));
            }
        }

        info!(results = results.len().min(count), "Web search completed");
        Ok(lines.join("\n"))
    }
}
