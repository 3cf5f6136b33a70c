//! Engine configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{LocalModelLoader, OllamaModelLoader};
use crate::cache::{DiskCache, MemoryCache, NoopCache, QueryCache, RedisCache, DEFAULT_EXPIRY};
use crate::model::SharedModel;
use crate::ollama::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use querylens_local_ai::{paths, DEFAULT_MODEL_FILENAME, DEFAULT_PORT};
use tracing::warn;

/// Default Redis port.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Default generation budget per query.
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 100;

/// Which cache backs the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Disabled,
    Memory,
    Disk(PathBuf),
    Redis { host: String, port: u16 },
}

impl CacheBackend {
    /// Build the cache. An unreachable Redis server disables caching.
    pub fn build(&self) -> Arc<dyn QueryCache> {
        match self {
            CacheBackend::Disabled => Arc::new(NoopCache),
            CacheBackend::Memory => Arc::new(MemoryCache::new()),
            CacheBackend::Disk(dir) => Arc::new(DiskCache::new(dir.clone())),
            CacheBackend::Redis { host, port } => match RedisCache::connect(host, *port) {
                Ok(cache) => Arc::new(cache),
                Err(e) => {
                    warn!("Redis connection failed: {}", e);
                    warn!("Caching disabled due to connection failure");
                    Arc::new(NoopCache)
                }
            },
        }
    }
}

/// Where the model runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelBackend {
    /// llama-server managed by querylens.
    Local { model_filename: String, port: u16 },
    Ollama { base_url: String, model: String },
}

/// Configuration for the query engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backend: ModelBackend,
    /// Maximum new tokens per generation (default: 100)
    pub max_new_tokens: u32,
    pub cache: CacheBackend,
    /// Lifetime of cache entries (default: 1 hour)
    pub cache_expiry: Duration,
    /// How long to wait for a freshly started llama-server.
    pub startup_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::Local {
                model_filename: DEFAULT_MODEL_FILENAME.to_string(),
                port: DEFAULT_PORT,
            },
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            cache: CacheBackend::Memory,
            cache_expiry: DEFAULT_EXPIRY,
            startup_timeout: Duration::from_secs(120),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Create config from any variable source. Unparseable values fall back
    /// to the defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let backend = match var("QUERYLENS_BACKEND").map(|v| v.to_lowercase()).as_deref() {
            Some("ollama") => ModelBackend::Ollama {
                base_url: var("QUERYLENS_OLLAMA_URL")
                    .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
                model: var("QUERYLENS_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            },
            _ => ModelBackend::Local {
                model_filename: var("QUERYLENS_MODEL")
                    .unwrap_or_else(|| DEFAULT_MODEL_FILENAME.to_string()),
                port: var("QUERYLENS_LOCAL_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_PORT),
            },
        };

        let redis_backend = || CacheBackend::Redis {
            host: var("REDIS_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: var("REDIS_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REDIS_PORT),
        };
        let redis_enabled =
            var("REDIS_ENABLED").map_or(false, |v| v.eq_ignore_ascii_case("true"));

        let cache = match var("QUERYLENS_CACHE").map(|v| v.to_lowercase()).as_deref() {
            Some("none") | Some("off") | Some("false") => CacheBackend::Disabled,
            Some("redis") => redis_backend(),
            Some("disk") => {
                let dir = var("QUERYLENS_CACHE_DIR")
                    .map(PathBuf::from)
                    .or_else(|| paths::cache_dir().ok())
                    .unwrap_or_else(|| PathBuf::from(".querylens-cache"));
                CacheBackend::Disk(dir)
            }
            Some("memory") => CacheBackend::Memory,
            _ if redis_enabled => redis_backend(),
            _ => CacheBackend::Memory,
        };

        let max_new_tokens = var("QUERYLENS_MAX_NEW_TOKENS")
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_new_tokens);

        let cache_expiry = var("QUERYLENS_CACHE_TTL")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_expiry);

        let startup_timeout = var("QUERYLENS_STARTUP_TIMEOUT")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.startup_timeout);

        Self {
            backend,
            max_new_tokens,
            cache,
            cache_expiry,
            startup_timeout,
        }
    }

    /// Lazily-loading model handle for the configured backend.
    pub fn model(&self) -> SharedModel {
        match &self.backend {
            ModelBackend::Local {
                model_filename,
                port,
            } => SharedModel::lazy(LocalModelLoader {
                model_filename: model_filename.clone(),
                port: *port,
                max_new_tokens: self.max_new_tokens,
                startup_timeout: self.startup_timeout,
            }),
            ModelBackend::Ollama { base_url, model } => SharedModel::lazy(OllamaModelLoader {
                base_url: base_url.clone(),
                model: model.clone(),
            }),
        }
    }

    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for engine configuration.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn backend(mut self, backend: ModelBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn max_new_tokens(mut self, tokens: u32) -> Self {
        self.config.max_new_tokens = tokens;
        self
    }

    pub fn cache(mut self, cache: CacheBackend) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn cache_expiry(mut self, expiry: Duration) -> Self {
        self.config.cache_expiry = expiry;
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.config.startup_timeout = timeout;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
