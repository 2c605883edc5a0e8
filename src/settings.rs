//! Application settings: storage paths, pipeline tuning, and provider
//! endpoints. Loaded from `~/.filings-qa/config.json` with serde defaults so
//! a partial or missing config file always yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Generation provider configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationSettings {
    /// Base URL of the endpoint, e.g. `http://127.0.0.1:8080`.
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Name of the environment variable holding the API key, if the endpoint
    /// requires one. The key itself never lives in the config file.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_generation_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_generation_model() -> String {
    "gemini-2.5-pro".to_string()
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: default_generation_base_url(),
            model: default_generation_model(),
            api_key_env: None,
        }
    }
}

/// OCR sidecar configuration. OCR is the last extraction fallback and is
/// optional: with no endpoint configured, image-only filings simply yield
/// nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OcrSettings {
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaSettings {
    /// Root of the per-company filing layout: `<documents_dir>/<company>/*.pdf`.
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
    /// Root of the per-company index datasets: `<index_dir>/<company>`.
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
    /// Maximum number of company indexes held in memory at once.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub ocr: OcrSettings,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("downloaded_filings")
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("vector_store")
}

fn default_cache_capacity() -> usize {
    5
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_top_k() -> usize {
    4
}

impl Default for QaSettings {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            index_dir: default_index_dir(),
            cache_capacity: default_cache_capacity(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            generation: GenerationSettings::default(),
            ocr: OcrSettings::default(),
        }
    }
}

/// Get the path to the config file.
fn get_config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".filings-qa").join("config.json")
}

/// Load settings from the config file, falling back to defaults on any
/// missing or unparseable file.
pub async fn load_settings(path: Option<&std::path::Path>) -> QaSettings {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    match fs::read_to_string(&config_path).await {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(settings) => {
                tracing::debug!(path = %config_path.display(), "settings loaded");
                settings
            }
            Err(e) => {
                tracing::warn!(path = %config_path.display(), error = %e, "failed to parse settings, using defaults");
                QaSettings::default()
            }
        },
        Err(e) => {
            tracing::debug!(path = %config_path.display(), error = %e, "no config file, using defaults");
            QaSettings::default()
        }
    }
}

/// Save settings to the config file.
pub async fn save_settings(settings: &QaSettings, path: Option<&std::path::Path>) -> Result<(), String> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;

    fs::write(&config_path, contents)
        .await
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}
