//! Optical character recognition provider for scanned filings.

use crate::error::QaError;
use async_trait::async_trait;

/// Recognizes text in a rendered page image (PNG bytes). The last rung of the
/// extraction fallback chain; an error here means "this page stays empty",
/// never a failed ingest.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, png: &[u8]) -> Result<String, QaError>;
}

/// Client for an HTTP OCR sidecar: POST the PNG, get `{"text": "..."}` back.
pub struct HttpOcrEngine {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOcrEngine {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn recognize(&self, png: &[u8]) -> Result<String, QaError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(png.to_vec())
            .send()
            .await
            .map_err(|e| QaError::Provider(format!("OCR request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(QaError::Provider(format!(
                "OCR endpoint returned {}: {}",
                status, text
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QaError::Provider(format!("invalid OCR response: {}", e)))?;

        value["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| QaError::Provider("OCR response had no text field".to_string()))
    }
}
