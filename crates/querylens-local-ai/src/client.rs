//! HTTP client for llama-server's native completion API.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::LocalAIError;
use crate::DEFAULT_PORT;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Talks to one llama-server instance.
#[derive(Debug, Clone)]
pub struct LlamaCppClient {
    http: reqwest::Client,
    base_url: String,
}

/// Raw-prompt completion request (`POST /completion`).
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
    #[serde(default)]
    tokens_predicted: Option<u32>,
}

/// `GET /health` body. llama-server answers 503 with `"loading model"`
/// until the weights are in memory.
#[derive(Debug, Deserialize)]
struct HealthStatus {
    #[serde(default)]
    status: String,
}

/// `GET /v1/models` body. llama-server lists the one model it serves, with
/// the path or alias it was started with as the id.
#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl LlamaCppClient {
    /// Client for `127.0.0.1` on [`DEFAULT_PORT`].
    pub fn new() -> Self {
        Self::with_port(DEFAULT_PORT)
    }

    pub fn with_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_port(port: u16) -> Self {
        Self::with_url(format!("http://127.0.0.1:{}", port))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ok once the server is up and has finished loading its model.
    pub async fn check_health(&self) -> Result<(), LocalAIError> {
        let response = self
            .http
            .get(self.endpoint("health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response
            .json::<HealthStatus>()
            .await
            .map(|h| h.status)
            .unwrap_or_default();
        debug!("llama-server at {} not ready: {}", self.base_url, status);
        Err(LocalAIError::ServerNotRunning(self.base_url.clone()))
    }

    /// Path or alias of the model the server was started with, if it says.
    pub async fn loaded_model(&self) -> Result<Option<String>, LocalAIError> {
        let response = self
            .http
            .get(self.endpoint("v1/models"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LocalAIError::Api(format!("{}: {}", status, body)));
        }

        let models: ModelList = response.json().await?;
        Ok(models.data.into_iter().next().map(|m| m.id))
    }

    /// Greedy completion of `prompt`, at most `max_tokens` new tokens.
    /// Only the continuation is returned, never the prompt.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LocalAIError> {
        let request = CompletionRequest {
            prompt,
            n_predict: max_tokens,
            temperature: 0.0,
            stream: false,
        };

        let response = self
            .http
            .post(self.endpoint("completion"))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LocalAIError::Api(format!("{}: {}", status, body)));
        }

        let completion: CompletionResponse = response.json().await?;
        debug!(
            "llama-server returned {} chars ({} tokens)",
            completion.content.len(),
            completion
                .tokens_predicted
                .map_or_else(|| "?".to_string(), |n| n.to_string())
        );
        Ok(completion.content)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Connection failures mean no server; anything else is a transport error.
    fn send_error(&self, e: reqwest::Error) -> LocalAIError {
        if e.is_connect() || e.is_timeout() {
            LocalAIError::ServerNotRunning(self.base_url.clone())
        } else {
            LocalAIError::Http(e)
        }
    }
}

impl Default for LlamaCppClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_url() {
        let client = LlamaCppClient::new();
        assert_eq!(client.base_url(), "http://127.0.0.1:11436");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = LlamaCppClient::with_url("http://gpu-box:9000/");
        assert_eq!(client.endpoint("completion"), "http://gpu-box:9000/completion");
    }

    #[test]
    fn test_request_shape() {
        let request = CompletionRequest {
            prompt: "Query: \"red sofa\"",
            n_predict: 100,
            temperature: 0.0,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["n_predict"], 100);
        assert_eq!(json["stream"], false);
        assert_eq!(json["prompt"], "Query: \"red sofa\"");
    }

    #[test]
    fn test_response_without_token_count() {
        let response: CompletionResponse =
            serde_json::from_str(r#"{"content": "{\"item_type\": \"sofa\"}"}"#).unwrap();
        assert_eq!(response.content, r#"{"item_type": "sofa"}"#);
        assert!(response.tokens_predicted.is_none());
    }

    #[test]
    fn test_loading_status() {
        let health: HealthStatus = serde_json::from_str(r#"{"status": "loading model"}"#).unwrap();
        assert_eq!(health.status, "loading model");
    }

    #[test]
    fn test_model_list() {
        let models: ModelList = serde_json::from_str(
            r#"{"object": "list", "data": [{"id": "/models/qwen2.gguf", "object": "model", "owned_by": "llamacpp"}]}"#,
        )
        .unwrap();
        assert_eq!(models.data[0].id, "/models/qwen2.gguf");

        let empty: ModelList = serde_json::from_str(r#"{"object": "list"}"#).unwrap();
        assert!(empty.data.is_empty());
    }

    #[tokio::test]
    async fn test_loaded_model_unreachable_server() {
        let client = LlamaCppClient::with_port(1);
        let result = client.loaded_model().await;
        assert!(matches!(result, Err(LocalAIError::ServerNotRunning(_))));
    }

    #[tokio::test]
    async fn test_health_unreachable_server() {
        // Nothing listens on port 1.
        let client = LlamaCppClient::with_port(1);
        let result = client.check_health().await;
        assert!(matches!(result, Err(LocalAIError::ServerNotRunning(_))));
    }
}
