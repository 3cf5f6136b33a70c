//! Data directory layout (`~/.querylens/`).

use std::path::PathBuf;

use crate::error::LocalAIError;

/// Environment variable that relocates the data directory.
pub const DATA_DIR_ENV: &str = "QUERYLENS_HOME";

/// Get the querylens data directory.
///
/// `QUERYLENS_HOME` wins over `~/.querylens`.
pub fn data_dir() -> Result<PathBuf, LocalAIError> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".querylens"))
        .ok_or(LocalAIError::NoDataDir)
}

pub fn models_dir() -> Result<PathBuf, LocalAIError> {
    Ok(data_dir()?.join("models"))
}

pub fn bin_dir() -> Result<PathBuf, LocalAIError> {
    Ok(data_dir()?.join("bin"))
}

/// Default directory for the on-disk query cache.
pub fn cache_dir() -> Result<PathBuf, LocalAIError> {
    Ok(data_dir()?.join("cache"))
}

/// Get the path to the llama-server binary.
pub fn llama_server_path() -> Result<PathBuf, LocalAIError> {
    let binary_name = if cfg!(target_os = "windows") {
        "llama-server.exe"
    } else {
        "llama-server"
    };
    Ok(bin_dir()?.join(binary_name))
}

pub fn model_path(filename: &str) -> Result<PathBuf, LocalAIError> {
    Ok(models_dir()?.join(filename))
}

/// Ensure the data directories exist.
pub fn ensure_dirs() -> Result<(), LocalAIError> {
    std::fs::create_dir_all(models_dir()?)?;
    std::fs::create_dir_all(bin_dir()?)?;
    Ok(())
}
