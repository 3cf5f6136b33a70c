//! # querylens core
//!
//! Turns free-form furniture queries into structured records using a small
//! instruction-tuned language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │    Query    │ --> │    Model    │ --> │   Parser    │ --> │  Overrides   │
//! │  (trimmed)  │     │Local/Ollama │     │  (cascade)  │     │ + Normalizer │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────────────┘
//!        │                                                            │
//!        └──────────────────────┬─────────────────────────────────────┘
//!                         ┌─────┴─────┐
//!                         │   Cache   │
//!                         └───────────┘
//! ```
//!
//! ## Model backends
//!
//! - **Local** (primary) - llama-server with a GGUF model
//! - **Ollama** - an existing Ollama daemon
//!
//! ## Usage
//!
//! ```ignore
//! use querylens_core::{EngineConfig, QueryEngine};
//!
//! let engine = QueryEngine::new(EngineConfig::from_env());
//! let response = engine.handle("blue wooden dining table").await?;
//! println!("{:?}", response.parsed_query);
//! ```

mod backend;
mod cache;
mod config;
mod engine;
pub mod keywords;
mod model;
mod normalize;
mod ollama;
mod overrides;
pub mod parser;
pub mod prompt;
mod record;
mod response;

pub use backend::{LocalModel, LocalModelLoader, OllamaModel, OllamaModelLoader};
pub use cache::{DiskCache, MemoryCache, NoopCache, QueryCache, RedisCache, DEFAULT_EXPIRY};
pub use config::{
    CacheBackend, EngineConfig, EngineConfigBuilder, ModelBackend, DEFAULT_MAX_NEW_TOKENS,
    DEFAULT_REDIS_PORT,
};
pub use engine::{EngineError, QueryEngine};
pub use model::{ModelError, ModelLoader, SharedModel, TextGenerator};
pub use normalize::normalize;
pub use ollama::{OllamaClient, OllamaError, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
pub use overrides::{FieldPatch, OverrideEngine, OverrideRule, DEFAULT_RULES};
pub use parser::{parse, parse_traced, ExtractionStage};
pub use record::{ParsedRecord, RecordMap};
pub use response::{DebugResponse, QueryResponse};

pub use querylens_local_ai::{
    paths as local_ai_paths, LlamaCppClient, LlamaCppServer, LocalAIError, ModelInfo, ModelManager,
    DEFAULT_MODEL_FILENAME, DEFAULT_MODEL_NAME, DEFAULT_PORT as DEFAULT_LOCAL_AI_PORT,
};
