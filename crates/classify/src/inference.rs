//! Generative-inference client (generateContent-style endpoint).

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors from the inference fallback.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("inference request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("inference service returned HTTP {0}")]
    Status(u16),

    #[error("inference service returned an empty reply")]
    EmptyResponse,

    /// The reply was not valid JSON after cleanup. Recoverable at the batch
    /// level; callers surface a generic analysis-failed message and never
    /// echo raw model output.
    #[error("inference reply was not valid JSON: {0}")]
    InferenceFormat(String),
}

/// Inference endpoint configuration.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Base URL of the text-generation API
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// API key, passed as a query parameter
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash-latest".to_string(),
            api_key: String::new(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Client for a single-prompt text-generation endpoint.
pub struct InferenceClient {
    config: InferenceConfig,
    client: reqwest::Client,
}

impl InferenceClient {
    pub fn new(config: InferenceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Send one prompt, return the first candidate's text.
    pub async fn generate(&self, prompt: &str) -> Result<String, ClassifyError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });

        tracing::debug!(model = %self.config.model, "Calling inference service");

        let response = self
            .client
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClassifyError::Status(response.status().as_u16()));
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .map(|part| part.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ClassifyError::EmptyResponse)
    }
}

/// Strip Markdown code-fence markers from a model reply.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}
