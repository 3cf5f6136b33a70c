use thiserror::Error;

/// Failures around the local llama-server backend.
#[derive(Debug, Error)]
pub enum LocalAIError {
    #[error("request to llama-server failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed llama-server response: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success status, with the body llama-server sent.
    #[error("llama-server error {0}")]
    Api(String),

    #[error("no llama-server answering at {0}")]
    ServerNotRunning(String),

    #[error("could not launch llama-server: {0}")]
    ServerStartFailed(String),

    #[error("llama-server did not become ready in time")]
    ServerStartTimeout,

    #[error("llama-server binary missing (looked for {0})")]
    ServerBinaryNotFound(String),

    #[error("model {0} is not installed; run `querylens model pull`")]
    ModelNotFound(String),

    #[error("model download failed: {0}")]
    DownloadFailed(String),

    #[error("downloaded model has sha256 {actual}, expected {expected}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Neither `QUERYLENS_HOME` nor a home directory is available.
    #[error("cannot locate the querylens data directory; set QUERYLENS_HOME")]
    NoDataDir,
}
