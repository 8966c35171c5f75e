use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::finding::Finding;
use crate::types::SearchCandidate;

/// Raw HTTP GET, no retries. The fetcher layers robots, throttling and backoff on top.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<HttpGetResult, String>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub body: String,
    pub content_type: String,
    /// `Retry-After` in seconds, when the server sent one.
    pub retry_after_secs: Option<u64>,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>>;
}

/// Free-text generation backing the escalation gate and the genre analyzer.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Optional text generation. Call sites match on this instead of null-checking.
#[derive(Clone)]
pub enum TextCapability {
    Available(Arc<dyn TextGenerator>),
    Unavailable,
}

impl TextCapability {
    pub fn available(generator: impl TextGenerator + 'static) -> Self {
        TextCapability::Available(Arc::new(generator))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, TextCapability::Available(_))
    }
}

impl std::fmt::Debug for TextCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextCapability::Available(_) => write!(f, "TextCapability::Available"),
            TextCapability::Unavailable => write!(f, "TextCapability::Unavailable"),
        }
    }
}

/// Persistence collaborator. Implementations upsert by `Finding::natural_key`.
#[async_trait]
pub trait FindingSink: Send + Sync {
    async fn upsert(&self, finding: &Finding) -> Result<()>;
}
