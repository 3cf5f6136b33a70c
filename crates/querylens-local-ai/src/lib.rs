//! Local model backend for querylens using llama.cpp.
//!
//! querylens runs a small instruction-tuned model through its own
//! `llama-server` process. This crate owns that process, the GGUF files it
//! loads and the HTTP client used to talk to it.

mod client;
mod error;
mod model;
pub mod paths;
mod server;

pub use client::LlamaCppClient;
pub use error::LocalAIError;
pub use model::{ModelInfo, ModelManager};
pub use server::LlamaCppServer;

/// Default port for the local llama-server instance.
pub const DEFAULT_PORT: u16 = 11436;

/// Default model name used for query understanding.
pub const DEFAULT_MODEL_NAME: &str = "qwen2-0.5b-instruct";

/// Default model filename.
pub const DEFAULT_MODEL_FILENAME: &str = "qwen2-0_5b-instruct-q8_0.gguf";
