//! Serve command - run the HTTP API.

use querylens_core::{EngineConfig, QueryEngine};
use querylens_server::AppState;
use tracing::info;

pub(crate) async fn run(host: &str, port: u16, preload: bool) -> miette::Result<()> {
    let engine = QueryEngine::new(EngineConfig::from_env());
    let config = engine.config();
    info!(
        "Starting querylens v{} (backend: {:?}, cache: {:?}, expiry: {}s)",
        env!("CARGO_PKG_VERSION"),
        config.backend,
        config.cache,
        config.cache_expiry.as_secs()
    );

    if preload {
        info!("Preloading model before accepting requests");
        engine
            .preload()
            .await
            .map_err(|e| miette::miette!("{}", e))?;
    }

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| miette::miette!("Failed to bind {}: {}", addr, e))?;

    querylens_server::serve(listener, AppState::new(engine))
        .await
        .map_err(|e| miette::miette!("Server error: {}", e))
}
