//! Concrete model backends behind [`TextGenerator`].

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::model::{ModelError, ModelLoader, TextGenerator};
use crate::ollama::OllamaClient;
use querylens_local_ai::{LlamaCppClient, LlamaCppServer};

/// Model served by a llama-server process.
pub struct LocalModel {
    client: LlamaCppClient,
    name: String,
    /// Owned when this process started the server; dropping stops it.
    _server: Option<LlamaCppServer>,
}

#[async_trait]
impl TextGenerator for LocalModel {
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String, ModelError> {
        let start = Instant::now();
        debug!(
            "Generating response for prompt of length {} chars with max_new_tokens={}",
            prompt.len(),
            max_new_tokens
        );
        let text = self.client.complete(prompt, max_new_tokens).await?;
        info!(
            "Total generation process took {:.2} seconds",
            start.elapsed().as_secs_f64()
        );
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Loads a GGUF model through llama-server.
///
/// A server already answering on the port is reused; otherwise one is
/// started from the managed data directory.
#[derive(Debug, Clone)]
pub struct LocalModelLoader {
    pub model_filename: String,
    pub port: u16,
    pub max_new_tokens: u32,
    pub startup_timeout: Duration,
}

#[async_trait]
impl ModelLoader for LocalModelLoader {
    async fn load(&self) -> Result<Arc<dyn TextGenerator>, ModelError> {
        let client = LlamaCppClient::with_port(self.port);

        if client.check_health().await.is_ok() {
            let name = match client.loaded_model().await {
                Ok(Some(loaded)) if same_model(&loaded, &self.model_filename) => {
                    info!("Reusing llama-server already running on port {}", self.port);
                    self.model_filename.clone()
                }
                Ok(Some(loaded)) => {
                    warn!(
                        "llama-server on port {} serves {}, not {}; reusing it anyway",
                        self.port, loaded, self.model_filename
                    );
                    loaded
                }
                Ok(None) | Err(_) => {
                    warn!(
                        "Reusing llama-server on port {} without confirming it serves {}",
                        self.port, self.model_filename
                    );
                    self.model_filename.clone()
                }
            };
            return Ok(Arc::new(LocalModel {
                client,
                name,
                _server: None,
            }));
        }

        info!(
            "Loading model {}, this may take several minutes...",
            self.model_filename
        );
        let start = Instant::now();

        let mut server = LlamaCppServer::new(self.model_filename.clone())
            .with_port(self.port)
            .with_n_predict(self.max_new_tokens);
        server.start()?;
        server.wait_ready(self.startup_timeout).await?;

        info!("Model loaded in {:.2} seconds", start.elapsed().as_secs_f64());

        Ok(Arc::new(LocalModel {
            client: server.client(),
            name: self.model_filename.clone(),
            _server: Some(server),
        }))
    }
}

/// Whether the id llama-server reports (a path or bare file name) names
/// `model_filename`.
fn same_model(loaded: &str, model_filename: &str) -> bool {
    loaded == model_filename
        || Path::new(loaded)
            .file_name()
            .is_some_and(|name| name == model_filename)
}

/// Model served by an Ollama daemon.
pub struct OllamaModel {
    client: OllamaClient,
}

#[async_trait]
impl TextGenerator for OllamaModel {
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String, ModelError> {
        Ok(self.client.generate(prompt, max_new_tokens).await?)
    }

    fn name(&self) -> &str {
        self.client.model()
    }
}

/// Checks the Ollama daemon has the model before handing it out.
#[derive(Debug, Clone)]
pub struct OllamaModelLoader {
    pub base_url: String,
    pub model: String,
}

#[async_trait]
impl ModelLoader for OllamaModelLoader {
    async fn load(&self) -> Result<Arc<dyn TextGenerator>, ModelError> {
        let client = OllamaClient::with_config(self.base_url.clone(), self.model.clone());
        client.check_availability().await?;
        info!("Using Ollama model {} at {}", self.model, self.base_url);
        Ok(Arc::new(OllamaModel { client }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_model() {
        let file = "qwen2-0_5b-instruct-q8_0.gguf";
        assert!(same_model(file, file));
        assert!(same_model("/home/me/.querylens/models/qwen2-0_5b-instruct-q8_0.gguf", file));
        assert!(!same_model("/models/llama-3-8b.gguf", file));
        assert!(!same_model("qwen2", file));
    }
}
