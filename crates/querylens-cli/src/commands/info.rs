//! Info command - show configuration and installation details.

use querylens_core::prompt::PROMPT_VERSION;
use querylens_core::{CacheBackend, EngineConfig, ModelBackend, OverrideEngine};

pub(crate) fn run() -> miette::Result<()> {
    let config = EngineConfig::from_env();

    println!("querylens");
    println!("=========");
    println!();
    println!("Version:        {}", env!("CARGO_PKG_VERSION"));
    println!("Prompt version: {}", PROMPT_VERSION);
    println!();

    println!("Model backend:");
    match &config.backend {
        ModelBackend::Local {
            model_filename,
            port,
        } => {
            println!("  llama.cpp (local)");
            println!("  Model: {}", model_filename);
            println!("  Port:  {}", port);
        }
        ModelBackend::Ollama { base_url, model } => {
            println!("  Ollama");
            println!("  Model: {}", model);
            println!("  URL:   {}", base_url);
        }
    }
    println!("  Max new tokens: {}", config.max_new_tokens);
    println!();

    println!("Cache:");
    match &config.cache {
        CacheBackend::Disabled => println!("  disabled"),
        CacheBackend::Memory => println!("  in-memory"),
        CacheBackend::Disk(dir) => println!("  disk ({})", dir.display()),
        CacheBackend::Redis { host, port } => println!("  redis ({}:{})", host, port),
    }
    println!("  Expiry: {}s", config.cache_expiry.as_secs());
    println!();

    println!("Override rules:");
    for rule in OverrideEngine::default().rules() {
        println!("  {}", rule.name);
    }
    println!();

    println!("Endpoints (querylens serve):");
    println!("  POST /parse  - Parse a query with the language model");
    println!("  POST /test   - Keyword-based parsing");
    println!("  POST /debug  - Raw model output");
    println!("  GET  /health - Health check");

    Ok(())
}
