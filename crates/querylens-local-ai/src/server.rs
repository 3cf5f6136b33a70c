//! Lifecycle of a llama-server child process.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::LlamaCppClient;
use crate::error::LocalAIError;
use crate::paths::{llama_server_path, model_path};
use crate::DEFAULT_PORT;

/// Context window handed to llama-server. Prompt plus answer fit easily.
const CONTEXT_SIZE: u32 = 2048;

/// Readiness poll interval.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long a SIGTERM'd server gets before it is killed.
const GRACE_PERIOD: Duration = Duration::from_secs(2);

const REAP_INTERVAL: Duration = Duration::from_millis(50);

/// A llama-server process serving one GGUF model on localhost.
///
/// The process is owned: dropping the handle sends SIGTERM and leaves the
/// grace period and kill to a background thread.
pub struct LlamaCppServer {
    port: u16,
    model_filename: String,
    n_predict: u32,
    child: Option<Child>,
}

impl LlamaCppServer {
    pub fn new(model_filename: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            model_filename: model_filename.into(),
            n_predict: 100,
            child: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Server-side ceiling on generated tokens.
    pub fn with_n_predict(mut self, n_predict: u32) -> Self {
        self.n_predict = n_predict;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn model_filename(&self) -> &str {
        &self.model_filename
    }

    pub fn binary_exists(&self) -> bool {
        matches!(llama_server_path(), Ok(path) if path.is_file())
    }

    pub fn model_exists(&self) -> bool {
        matches!(model_path(&self.model_filename), Ok(path) if path.is_file())
    }

    /// Spawn llama-server. Returns once the process exists, not once the
    /// model is loaded; see [`wait_ready`](Self::wait_ready).
    pub fn start(&mut self) -> Result<(), LocalAIError> {
        if self.child.is_some() {
            debug!("llama-server already spawned on port {}", self.port);
            return Ok(());
        }

        let binary = llama_server_path()?;
        if !binary.is_file() {
            return Err(LocalAIError::ServerBinaryNotFound(binary.display().to_string()));
        }

        let model = model_path(&self.model_filename)?;
        if !model.is_file() {
            return Err(LocalAIError::ModelNotFound(self.model_filename.clone()));
        }

        info!(
            "Launching llama-server for {} on 127.0.0.1:{}",
            self.model_filename, self.port
        );

        let child = Command::new(&binary)
            .args(self.args(&model))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                LocalAIError::ServerStartFailed(format!("{}: {}", binary.display(), e))
            })?;

        debug!("llama-server pid {}", child.id());
        self.child = Some(child);
        Ok(())
    }

    fn args(&self, model: &Path) -> Vec<OsString> {
        vec![
            "--model".into(),
            model.as_os_str().to_owned(),
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            self.port.to_string().into(),
            "--ctx-size".into(),
            CONTEXT_SIZE.to_string().into(),
            "--n-predict".into(),
            self.n_predict.to_string().into(),
        ]
    }

    /// Poll `/health` until the model is loaded or `timeout` passes.
    ///
    /// Fails early if the process exits while loading.
    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<(), LocalAIError> {
        let client = self.client();
        let deadline = Instant::now() + timeout;
        let started = Instant::now();

        loop {
            if client.check_health().await.is_ok() {
                info!(
                    "llama-server ready after {:.2}s",
                    started.elapsed().as_secs_f64()
                );
                return Ok(());
            }

            if self.child.is_some() && !self.is_running() {
                return Err(LocalAIError::ServerStartFailed(
                    "llama-server exited while loading the model".to_string(),
                ));
            }

            if Instant::now() >= deadline {
                return Err(LocalAIError::ServerStartTimeout);
            }

            sleep(POLL_INTERVAL).await;
        }
    }

    /// Terminate the process: SIGTERM, a grace period, then kill.
    pub async fn stop(&mut self) -> Result<(), LocalAIError> {
        let Some(child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping llama-server (pid {})", child.id());

        let signalled = send_sigterm(&child);
        tokio::task::spawn_blocking(move || reap(child, signalled))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;
        Ok(())
    }

    /// True while the spawned process has not exited.
    pub fn is_running(&mut self) -> bool {
        let exited = match self.child.as_mut() {
            None => return false,
            Some(child) => !matches!(child.try_wait(), Ok(None)),
        };
        if exited {
            self.child = None;
        }
        !exited
    }

    /// Client pointed at this server's port.
    pub fn client(&self) -> LlamaCppClient {
        LlamaCppClient::with_port(self.port)
    }
}

impl Drop for LlamaCppServer {
    fn drop(&mut self) {
        let Some(child) = self.child.take() else {
            return;
        };
        info!("Stopping llama-server (pid {})", child.id());

        let signalled = send_sigterm(&child);
        let spawned = std::thread::Builder::new()
            .name("llama-server-reaper".to_string())
            .spawn(move || {
                if let Err(e) = reap(child, signalled) {
                    warn!("Failed to stop llama-server: {}", e);
                }
            });
        if let Err(e) = spawned {
            warn!("Failed to spawn llama-server reaper: {}", e);
        }
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    // SAFETY: the pid belongs to a child we spawned and have not reaped.
    unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}

/// Wait out the grace period after SIGTERM, then kill and collect the child.
/// Blocks the calling thread.
fn reap(mut child: Child, signalled: bool) -> std::io::Result<()> {
    if signalled {
        let deadline = Instant::now() + GRACE_PERIOD;
        while Instant::now() < deadline {
            if let Some(status) = child.try_wait()? {
                debug!("llama-server exited: {}", status);
                return Ok(());
            }
            std::thread::sleep(REAP_INTERVAL);
        }
        warn!("llama-server ignored SIGTERM, killing it");
    }

    child.kill()?;
    child.wait()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let server = LlamaCppServer::new("test-model.gguf")
            .with_port(9999)
            .with_n_predict(64);
        assert_eq!(server.port(), 9999);
        assert_eq!(server.model_filename(), "test-model.gguf");
        assert_eq!(server.n_predict, 64);
    }

    #[test]
    fn test_args() {
        let server = LlamaCppServer::new("m.gguf").with_port(9001).with_n_predict(32);
        let args: Vec<String> = server
            .args(Path::new("/models/m.gguf"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "--model",
                "/models/m.gguf",
                "--host",
                "127.0.0.1",
                "--port",
                "9001",
                "--ctx-size",
                "2048",
                "--n-predict",
                "32"
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_without_process() {
        let mut server = LlamaCppServer::new("test-model.gguf");
        assert!(!server.is_running());
        assert!(server.stop().await.is_ok());
    }

    #[test]
    fn test_missing_files_reported() {
        let server = LlamaCppServer::new("no-such-model-3f9c2a.gguf");
        assert!(!server.model_exists());
    }

    #[cfg(unix)]
    fn sleeper() -> Child {
        Command::new("sleep").arg("30").spawn().unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_terminates_process() {
        let mut server = LlamaCppServer::new("m.gguf");
        server.child = Some(sleeper());
        assert!(server.is_running());

        let started = Instant::now();
        server.stop().await.unwrap();
        assert!(started.elapsed() < GRACE_PERIOD);
        assert!(!server.is_running());
    }

    #[cfg(unix)]
    #[test]
    fn test_drop_returns_immediately() {
        let child = sleeper();
        let pid = child.id() as libc::pid_t;
        let mut server = LlamaCppServer::new("m.gguf");
        server.child = Some(child);

        let started = Instant::now();
        drop(server);
        assert!(started.elapsed() < Duration::from_millis(500));

        // kill(pid, 0) fails once the reaper has collected the child.
        let deadline = Instant::now() + Duration::from_secs(5);
        while unsafe { libc::kill(pid, 0) } == 0 {
            assert!(Instant::now() < deadline, "child was never reaped");
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}
