//! Tavily search client
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::{AssistantError, AssistantResult};

pub const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Results pulled into an answer prompt
pub const MAX_RESULTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> AssistantResult<Vec<SearchHit>>;
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Clone)]
pub struct TavilySearch {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl TavilySearch {
    pub fn new(api_key: String) -> Self {
        TavilySearch {
            http: reqwest::Client::new(),
            api_key,
            endpoint: TAVILY_ENDPOINT.to_string(),
        }
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> AssistantResult<Vec<SearchHit>> {
        info!("Web search: {query}");
        let response = self
            .http
            .post(&self.endpoint)
            .json(&SearchRequest {
                api_key: &self.api_key,
                query,
                max_results: MAX_RESULTS,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Provider(format!(
                "search failed ({status}): {body}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::MalformedOutput(e.to_string()))?;
        debug!("Search returned {} results", parsed.results.len());
        Ok(parsed.results)
    }
}

/// `title: content` lines, one per hit
pub fn render_results(hits: &[SearchHit]) -> String {
    hits.iter()
        .take(MAX_RESULTS)
        .map(|h| format!("{}: {}", h.title.trim(), h.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_decoding_tolerates_missing_fields() {
        let parsed: SearchResponse = serde_json::from_str(
            r#"{"query": "x", "results": [{"title": "Dólar", "content": "R$ 5,10", "score": 0.9}, {"url": "https://a"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[1].url, "https://a");
        assert!(parsed.results[1].title.is_empty());
    }

    #[test]
    fn test_render_results_limits_and_formats() {
        let hits: Vec<SearchHit> = (0..5)
            .map(|i| SearchHit {
                title: format!("t{i}"),
                content: format!(" c{i} "),
                url: String::new(),
            })
            .collect();
        assert_eq!(render_results(&hits), "t0: c0\nt1: c1\nt2: c2");
        assert_eq!(render_results(&[]), "");
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(SearchRequest {
            api_key: "k",
            query: "clima",
            max_results: MAX_RESULTS,
        })
        .unwrap();
        assert_eq!(body["max_results"], 3);
        assert_eq!(body["query"], "clima");
    }
}
