//! Ollama API client, an alternative to the bundled llama.cpp backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default Ollama server URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Ollama tag for query understanding.
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2:0.5b";

/// Ollama API client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

/// Errors from the Ollama client.
#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Ollama API error: {0}")]
    Api(String),
    #[error("Ollama server not running at {0}. Start it with: ollama serve")]
    ServerNotRunning(String),
    #[error("Model '{0}' not found. Pull it with: ollama pull {0}")]
    ModelNotFound(String),
}

/// Request to the Ollama generate API, in raw mode so no chat template is
/// wrapped around the instruction prompt.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    raw: bool,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_OLLAMA_URL, DEFAULT_OLLAMA_MODEL)
    }

    pub fn with_config(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// Ok when the daemon answers and the model has been pulled.
    pub async fn check_availability(&self) -> Result<(), OllamaError> {
        let response = self
            .client
            .get(self.endpoint("api/tags"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|_| OllamaError::ServerNotRunning(self.base_url.clone()))?;

        let tags: OllamaTagsResponse = response.json().await?;
        if has_model(&tags.models, &self.model) {
            Ok(())
        } else {
            Err(OllamaError::ModelNotFound(self.model.clone()))
        }
    }

    /// Greedy continuation of `prompt`, at most `max_tokens` tokens.
    pub async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, OllamaError> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            raw: true,
            stream: false,
            options: OllamaOptions {
                temperature: 0.0,
                num_predict: max_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint("api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    OllamaError::ServerNotRunning(self.base_url.clone())
                } else {
                    OllamaError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OllamaError::Api(format!("{}: {}", status, body)));
        }

        match response.json::<OllamaResponse>().await? {
            OllamaResponse {
                error: Some(error), ..
            } => Err(OllamaError::Api(error)),
            OllamaResponse { response, .. } => Ok(response),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

/// `qwen2` matches `qwen2:latest`; a full tag must match exactly.
fn has_model(models: &[TagEntry], wanted: &str) -> bool {
    models.iter().any(|m| match m.name.split_once(':') {
        _ if m.name == wanted => true,
        Some((base, _)) => !wanted.contains(':') && base == wanted,
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client() {
        let client = OllamaClient::new();
        assert_eq!(client.base_url(), DEFAULT_OLLAMA_URL);
        assert_eq!(client.model(), DEFAULT_OLLAMA_MODEL);
    }

    #[test]
    fn test_request_uses_budget() {
        let request = OllamaRequest {
            model: "qwen2:0.5b",
            prompt: "Query: \"oak bed\"",
            raw: true,
            stream: false,
            options: OllamaOptions {
                temperature: 0.0,
                num_predict: 100,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["options"]["num_predict"], 100);
        assert_eq!(json["raw"], true);
    }

    #[test]
    fn test_error_body() {
        let body: OllamaResponse =
            serde_json::from_str(r#"{"error": "model 'qwen2:0.5b' not found"}"#).unwrap();
        assert_eq!(body.error.as_deref(), Some("model 'qwen2:0.5b' not found"));
        assert!(body.response.is_empty());
    }

    #[test]
    fn test_has_model() {
        let models: Vec<TagEntry> = ["qwen2:0.5b", "llama3:latest"]
            .iter()
            .map(|name| TagEntry {
                name: name.to_string(),
            })
            .collect();
        assert!(has_model(&models, "qwen2:0.5b"));
        assert!(has_model(&models, "llama3"));
        assert!(!has_model(&models, "qwen2:7b"));
        assert!(!has_model(&models, "mistral"));
    }
}
