//! Text generation seam and the process-wide model handle.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::ollama::OllamaError;
use querylens_local_ai::LocalAIError;

/// Errors from loading or running a model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Local(#[from] LocalAIError),
    #[error(transparent)]
    Ollama(#[from] OllamaError),
    /// The handle was built without a loader and holds no model.
    #[error("no model loaded")]
    NotLoaded,
    #[error("{0}")]
    Other(String),
}

/// A loaded causal language model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Continue `prompt` with at most `max_new_tokens` tokens.
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String, ModelError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Builds a [`TextGenerator`]. Loading may be slow (process start, weights).
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn TextGenerator>, ModelError>;
}

/// Process-wide model handle shared by all requests.
///
/// The model is built at most once. Concurrent first requests wait on the
/// same initialization; a failed load leaves the handle empty so a later
/// request can try again.
pub struct SharedModel {
    loader: Option<Box<dyn ModelLoader>>,
    cell: OnceCell<Arc<dyn TextGenerator>>,
}

impl SharedModel {
    /// Handle that loads lazily on first use.
    pub fn lazy(loader: impl ModelLoader + 'static) -> Self {
        Self {
            loader: Some(Box::new(loader)),
            cell: OnceCell::new(),
        }
    }

    /// Handle around an already-built model.
    pub fn preloaded(model: Arc<dyn TextGenerator>) -> Self {
        Self {
            loader: None,
            cell: OnceCell::new_with(Some(model)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Get the model, loading it if this is the first use.
    pub async fn get(&self) -> Result<Arc<dyn TextGenerator>, ModelError> {
        let model = self
            .cell
            .get_or_try_init(|| async {
                let loader = self.loader.as_ref().ok_or(ModelError::NotLoaded)?;
                info!("Initializing model for first request");
                loader.load().await.map_err(|e| {
                    error!("Failed to initialize model: {}", e);
                    e
                })
            })
            .await?;
        Ok(Arc::clone(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, prompt: &str, _max_new_tokens: u32) -> Result<String, ModelError> {
            Ok(prompt.to_string())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        fail_first: bool,
    }

    #[async_trait]
    impl ModelLoader for CountingLoader {
        async fn load(&self) -> Result<Arc<dyn TextGenerator>, ModelError> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_first && n == 0 {
                return Err(ModelError::Other("out of memory".to_string()));
            }
            Ok(Arc::new(Echo))
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_use_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let model = Arc::new(SharedModel::lazy(CountingLoader {
            loads: loads.clone(),
            fail_first: false,
        }));
        assert!(!model.is_loaded());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let model = model.clone();
                tokio::spawn(async move { model.get().await.map(|m| m.name().to_string()) })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "echo");
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(model.is_loaded());
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let loads = Arc::new(AtomicUsize::new(0));
        let model = SharedModel::lazy(CountingLoader {
            loads: loads.clone(),
            fail_first: true,
        });

        let err = model.get().await.err().unwrap();
        assert_eq!(err.to_string(), "out of memory");
        assert!(!model.is_loaded());

        assert!(model.get().await.is_ok());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_preloaded_handle() {
        let model = SharedModel::preloaded(Arc::new(Echo));
        assert!(model.is_loaded());
        let out = model.get().await.unwrap().generate("hi", 10).await.unwrap();
        assert_eq!(out, "hi");
    }
}
