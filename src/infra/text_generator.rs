use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::app::ports::{TextCapability, TextGenerator};
use crate::config::LlmConfig;
use crate::error::{Result, ScoutError};

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiCompatibleGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleGenerator {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
        });

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ScoutError::Generation(format!("HTTP {}: {}", status, body)));
        }

        let body: serde_json::Value = resp.json().await?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ScoutError::Generation("response has no message content".to_string()))?;
        debug!(model = %self.model, chars = content.len(), "Generated text");
        Ok(content.to_string())
    }
}

impl TextCapability {
    /// `Unavailable` when the API key variable named in `llm.api_key_env` is unset
    /// or empty.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                let generator = OpenAiCompatibleGenerator::new(config, key.trim().to_string())?;
                info!(model = %config.model, "Text generation enabled");
                Ok(TextCapability::available(generator))
            }
            _ => {
                info!(
                    env = %config.api_key_env,
                    "No API key for text generation; borderline candidates are rejected and genre analysis is skipped"
                );
                Ok(TextCapability::Unavailable)
            }
        }
    }
}
