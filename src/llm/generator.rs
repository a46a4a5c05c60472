//! Opaque text-generation capability and its HTTP implementation.
//!
//! The corrector model is treated as a black box behind [`TextGenerator`]:
//! "generate text from a prompt, bounded by a token budget".  [`ApiGenerator`]
//! implements it against any OpenAI-compatible `/v1/chat/completions`
//! endpoint — Ollama (OpenAI mode), LM Studio, vLLM, llama.cpp server, etc.
//! All connection details come from [`CorrectorConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::CorrectorConfig;

// ---------------------------------------------------------------------------
// InferenceError
// ---------------------------------------------------------------------------

/// Errors that can occur during a generation call.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// HTTP transport or connection error.
    #[error("inference request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("inference request timed out")]
    Timeout,

    /// The response could not be parsed as expected JSON.
    #[error("failed to parse inference response: {0}")]
    Parse(String),

    /// The model returned a response with no usable text content.
    #[error("model returned an empty response")]
    Empty,
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            InferenceError::Timeout
        } else {
            InferenceError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationParams
// ---------------------------------------------------------------------------

/// Per-call sampling parameters.
///
/// With a fixed `seed` (and low temperature) output is expected to be
/// reproducible; with `seed = None` it is explicitly non-deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Maximum tokens the model may generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Fixed sampling seed, when reproducibility is required.
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// TextGenerator trait
// ---------------------------------------------------------------------------

/// Async trait for the loaded corrector model's generate capability.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn TextGenerator>`).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the given chat prompt pair.
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, InferenceError>;
}

// ---------------------------------------------------------------------------
// ApiGenerator
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// The `Authorization: Bearer …` header is attached **only** when
/// `config.api_key` is `Some(key)` and `key` is non-empty — safe for Ollama
/// and other local providers that require no authentication.
pub struct ApiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl ApiGenerator {
    /// Build an `ApiGenerator` from corrector config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &CorrectorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl TextGenerator for ApiGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, InferenceError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model":       self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user",   "content": user_prompt   }
            ],
            "stream":      false,
            "temperature": params.temperature,
            "max_tokens":  params.max_tokens,
        });
        if let Some(seed) = params.seed {
            body["seed"] = serde_json::json!(seed);
        }

        let mut req = self.client.post(&url).json(&body);

        let key = self.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InferenceError::Parse(e.to_string()))?;

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(InferenceError::Empty)?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(InferenceError::Empty);
        }

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorrectorConfig;

    fn make_config(api_key: Option<&str>) -> CorrectorConfig {
        CorrectorConfig {
            api_key: api_key.map(|s| s.to_string()),
            ..CorrectorConfig::default()
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _gen = ApiGenerator::from_config(&make_config(None));
    }

    #[test]
    fn from_config_accepts_empty_api_key() {
        let _gen = ApiGenerator::from_config(&make_config(Some("")));
    }

    #[test]
    fn from_config_accepts_real_api_key() {
        let _gen = ApiGenerator::from_config(&make_config(Some("sk-test-1234")));
    }

    /// Verify that `ApiGenerator` is object-safe (usable as `dyn TextGenerator`).
    #[test]
    fn generator_is_object_safe() {
        let generator: Box<dyn TextGenerator> =
            Box::new(ApiGenerator::from_config(&make_config(None)));
        drop(generator);
    }

    #[test]
    fn timeout_maps_from_reqwest() {
        // Only the non-timeout branch is constructible without a live server;
        // the mapping itself is covered by matching on a constructed variant.
        let e = InferenceError::Timeout;
        assert!(e.to_string().contains("timed out"));
    }
}
