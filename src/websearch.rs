//! Web search fallback via the Tavily REST API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::WebHit;

/// Web snippets for a query, ordered by descending relevance.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>>;
}

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Serialize)]
struct TavilyRequest {
    api_key: String,
    query: String,
    search_depth: String,
    max_results: usize,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f32,
}

pub struct TavilySearch {
    api_key: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Steer generic queries toward game coverage before they hit the
    /// search engine.
    fn enhance_query(query: &str) -> String {
        let lower = query.to_lowercase();
        if lower.contains("game") || lower.contains("video game") {
            query.to_string()
        } else {
            format!("{} video game", query)
        }
    }
}

#[async_trait]
impl WebSearchProvider for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        let request = TavilyRequest {
            api_key: self.api_key.clone(),
            query: Self::enhance_query(query),
            search_depth: "advanced".to_string(),
            max_results,
            include_answer: true,
            include_raw_content: false,
        };

        let response = self
            .client
            .post(TAVILY_API_URL)
            .json(&request)
            .send()
            .await
            .context("Failed to send web search request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Web search API error {}: {}", status, body);
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .context("Failed to parse web search response")?;

        // Coerce into typed hits at the boundary; entries without a URL are
        // uncitable and get dropped here.
        let hits = parsed
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .map(|r| WebHit {
                title: r.title,
                url: r.url,
                content: r.content,
                score: r.score.clamp(0.0, 1.0),
            })
            .collect();

        Ok(hits)
    }
}

/// Wiring for instances without a search API key. Every call reports the
/// provider as unreachable, which the loop degrades to local evidence.
pub struct NoWebSearch;

#[async_trait]
impl WebSearchProvider for NoWebSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<WebHit>> {
        anyhow::bail!("web search is not configured (no API key)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enhances_queries_without_game_context() {
        assert_eq!(
            TavilySearch::enhance_query("Pokémon Gold release date"),
            "Pokémon Gold release date video game"
        );
    }

    #[test]
    fn leaves_game_queries_alone() {
        assert_eq!(
            TavilySearch::enhance_query("best racing video games"),
            "best racing video games"
        );
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let parsed: TavilyResponse =
            serde_json::from_str(r#"{"results": [{"url": "https://example.com"}]}"#).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].score, 0.0);
    }
}
