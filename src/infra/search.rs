use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::app::ports::SearchProvider;
use crate::config::SearchConfig;
use crate::error::{Result, ScoutError};
use crate::scrapers::html::html_to_text;
use crate::types::SearchCandidate;

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

/// Brave web search API.
pub struct BraveSearch {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    country: String,
    count: usize,
}

impl BraveSearch {
    pub fn new(config: &SearchConfig, api_key: String, count: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            country: config.country.clone(),
            count,
        })
    }

    /// Reads the key from the variable named in `search.api_key_env`.
    pub fn from_env(config: &SearchConfig, count: usize) -> Result<Self> {
        let key = std::env::var(&config.api_key_env).map_err(|_| {
            ScoutError::Config(format!(
                "search needs {} to be set (or pass --fixtures)",
                config.api_key_env
            ))
        })?;
        Self::new(config, key, count)
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>> {
        let count = self.count.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", count.as_str()), ("country", self.country.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScoutError::Search(format!("HTTP {}: {}", status, body)));
        }

        let parsed: BraveResponse = resp.json().await?;
        let candidates: Vec<SearchCandidate> = parsed
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchCandidate::new(r.url, html_to_text(&r.title), html_to_text(&r.description)))
            .collect();
        debug!(query, results = candidates.len(), "Search finished");
        Ok(candidates)
    }
}

/// Canned search results keyed by query, for offline runs and tests. The `*` entry
/// answers any query without its own entry.
#[derive(Debug, Clone, Default)]
pub struct FixtureSearch {
    results: HashMap<String, Vec<SearchCandidate>>,
}

impl FixtureSearch {
    pub fn new(results: HashMap<String, Vec<SearchCandidate>>) -> Self {
        Self { results }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let results: HashMap<String, Vec<SearchCandidate>> = serde_json::from_str(&content)?;
        Ok(Self::new(results))
    }
}

#[async_trait]
impl SearchProvider for FixtureSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>> {
        match self.results.get(query).or_else(|| self.results.get("*")) {
            Some(results) => Ok(results.clone()),
            None => {
                warn!(query, "No fixture results for query");
                Ok(Vec::new())
            }
        }
    }
}
