//! Answer generation provider: trait seam plus an OpenAI-compatible
//! chat-completions client.

use crate::error::QaError;
use crate::settings::GenerationSettings;
use async_trait::async_trait;
use serde_json::json;

/// Turns a fully-composed prompt into answer text. Failures are surfaced to
/// the caller as-is; retry policy belongs above this layer.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, QaError>;
}

/// Client for any `/v1/chat/completions` endpoint. Temperature is pinned to
/// zero: answers should be grounded in the retrieved context, not sampled.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(settings: &GenerationSettings) -> Self {
        let api_key = settings
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());

        Self {
            client: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
        }
    }
}

#[async_trait]
impl GenerationProvider for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> Result<String, QaError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| QaError::Provider(format!("generation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(QaError::Provider(format!(
                "generation endpoint returned {}: {}",
                status, text
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QaError::Provider(format!("invalid generation response: {}", e)))?;

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                QaError::Provider("generation response had no message content".to_string())
            })
    }
}
