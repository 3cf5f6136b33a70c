//! GGUF model download and management.

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::LocalAIError;
use crate::paths::{ensure_dirs, model_path, models_dir};
use crate::{DEFAULT_MODEL_FILENAME, DEFAULT_MODEL_NAME};

/// Model registry entry.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Display name of the model.
    pub name: String,
    /// Filename on disk.
    pub filename: String,
    pub url: String,
    /// Expected SHA256 checksum (optional).
    pub sha256: Option<String>,
    /// Size in bytes, used when the server sends no content length.
    pub size_bytes: Option<u64>,
}

/// Manager for downloading and managing models.
pub struct ModelManager {
    client: reqwest::Client,
}

impl ModelManager {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Qwen2-0.5B-Instruct, 8-bit quantized.
    pub fn default_model() -> ModelInfo {
        ModelInfo {
            name: DEFAULT_MODEL_NAME.to_string(),
            filename: DEFAULT_MODEL_FILENAME.to_string(),
            url: format!(
                "https://huggingface.co/Qwen/Qwen2-0.5B-Instruct-GGUF/resolve/main/{}",
                DEFAULT_MODEL_FILENAME
            ),
            sha256: None,
            size_bytes: Some(531_000_000),
        }
    }

    /// Installed models, as sorted file stems of `*.gguf` in the models directory.
    pub fn list_installed(&self) -> Result<Vec<String>, LocalAIError> {
        let dir = models_dir()?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut stems = Vec::new();
        for entry in fs::read_dir(&dir)?.flatten() {
            let path = entry.path();
            if !is_gguf(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }
        stems.sort();
        Ok(stems)
    }

    pub fn is_installed(&self, filename: &str) -> bool {
        matches!(model_path(filename), Ok(path) if path.is_file())
    }

    /// Fetch `model` into the models directory.
    ///
    /// Bytes land in a `.part` file that is renamed into place only after the
    /// transfer (and checksum, when known) succeeds, so an interrupted pull
    /// never looks installed.
    pub async fn download(&self, model: &ModelInfo) -> Result<PathBuf, LocalAIError> {
        ensure_dirs()?;
        let dest = model_path(&model.filename)?;
        let part = partial_path(&dest);

        info!("Fetching {} from {}", model.name, model.url);

        let response = self
            .client
            .get(&model.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| LocalAIError::DownloadFailed(format!("{}: {}", model.url, e)))?;

        let bar = progress_bar(response.content_length().or(model.size_bytes));
        let mut out = PartialFile::create(part)?;
        let mut digest = Sha256::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    bar.abandon();
                    return Err(LocalAIError::DownloadFailed(e.to_string()));
                }
            };
            if let Err(e) = out.write_all(&bytes) {
                bar.abandon();
                return Err(e.into());
            }
            digest.update(&bytes);
            bar.inc(bytes.len() as u64);
        }
        bar.finish_with_message("done");

        let actual = hex::encode(digest.finalize());
        if let Some(expected) = model.sha256.as_deref() {
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LocalAIError::ChecksumMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        debug!("sha256 {} for {}", actual, model.filename);

        out.persist(&dest)?;
        info!("{} installed at {}", model.name, dest.display());
        Ok(dest)
    }

    pub async fn download_default(&self) -> Result<PathBuf, LocalAIError> {
        self.download(&Self::default_model()).await
    }

    /// Copy a GGUF file that is already on disk into the models directory.
    pub fn install_from_path(&self, source: &Path) -> Result<PathBuf, LocalAIError> {
        if !source.is_file() {
            return Err(LocalAIError::ModelNotFound(source.display().to_string()));
        }
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LocalAIError::ModelNotFound(source.display().to_string()))?;

        ensure_dirs()?;
        let dest = model_path(name)?;
        if dest.as_path() != source {
            debug!("Copying {} -> {}", source.display(), dest.display());
            fs::copy(source, &dest)?;
        }
        Ok(dest)
    }

    /// Delete an installed model. Missing files are not an error.
    pub fn remove(&self, filename: &str) -> Result<(), LocalAIError> {
        if remove_if_present(&model_path(filename)?)? {
            info!("Removed model {}", filename);
        }
        Ok(())
    }
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Download target that is deleted on drop unless [`persist`](Self::persist)
/// moved it into place.
struct PartialFile {
    path: PathBuf,
    file: Option<File>,
}

impl PartialFile {
    fn create(path: PathBuf) -> io::Result<Self> {
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(bytes),
            None => Err(io::Error::new(io::ErrorKind::Other, "partial file closed")),
        }
    }

    fn persist(mut self, dest: &Path) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        fs::rename(&self.path, dest)?;
        self.path = PathBuf::new();
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        drop(self.file.take());
        if self.path.as_os_str().is_empty() {
            return;
        }
        debug!("Discarding partial download {}", self.path.display());
        if let Err(e) = remove_if_present(&self.path) {
            warn!("Could not remove {}: {}", self.path.display(), e);
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_gguf(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gguf")
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

fn progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(size) => {
            let pb = ProgressBar::new(size);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {bytes} downloaded")
            {
                pb.set_style(style);
            }
            pb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_path() {
        let dest = Path::new("/data/models/qwen2-0_5b-instruct-q8_0.gguf");
        assert_eq!(
            partial_path(dest),
            PathBuf::from("/data/models/qwen2-0_5b-instruct-q8_0.gguf.part")
        );
        assert!(!is_gguf(&partial_path(dest)));
        assert!(is_gguf(dest));
    }

    #[test]
    fn test_install_missing_file() {
        let manager = ModelManager::new();
        let err = manager
            .install_from_path(Path::new("/nonexistent/model.gguf"))
            .unwrap_err();
        assert!(matches!(err, LocalAIError::ModelNotFound(_)));
    }

    #[test]
    fn test_default_model_info() {
        let model = ModelManager::default_model();
        assert_eq!(model.name, DEFAULT_MODEL_NAME);
        assert_eq!(model.filename, DEFAULT_MODEL_FILENAME);
        assert!(model.url.ends_with(DEFAULT_MODEL_FILENAME));
    }

    #[test]
    fn test_partial_file_discarded_on_failure() {
        let dir = tempdir().unwrap();
        let part = dir.path().join("m.gguf.part");

        let mut out = PartialFile::create(part.clone()).unwrap();
        out.write_all(b"GGUF").unwrap();
        assert!(part.exists());
        drop(out);
        assert!(!part.exists());
    }

    #[test]
    fn test_partial_file_persisted() {
        let dir = tempdir().unwrap();
        let part = dir.path().join("m.gguf.part");
        let dest = dir.path().join("m.gguf");

        let mut out = PartialFile::create(part.clone()).unwrap();
        out.write_all(b"GGUF").unwrap();
        out.persist(&dest).unwrap();
        assert!(!part.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"GGUF");
    }

    #[test]
    fn test_remove_if_present() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.gguf");
        fs::write(&path, b"GGUF").unwrap();

        assert!(remove_if_present(&path).unwrap());
        assert!(!path.exists());
        assert!(!remove_if_present(&path).unwrap());
    }
}
