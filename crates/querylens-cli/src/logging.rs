//! Logging setup.
//!
//! `RUST_LOG` wins, then `--verbose`, then `LOG_LEVEL`. `JSON_LOGS=true`
//! switches to JSON lines and `LOG_FILE` appends a copy of every line to a
//! file.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

pub(crate) fn init(verbose: bool, default_level: &str) {
    let json = std::env::var("JSON_LOGS")
        .map(|v| is_truthy(&v))
        .unwrap_or(false);

    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ if verbose => EnvFilter::new("debug"),
        _ => {
            let level = std::env::var("LOG_LEVEL")
                .ok()
                .and_then(|v| level_directive(&v))
                .unwrap_or(default_level);
            EnvFilter::new(level)
        }
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();

    layers.push(if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    });

    let mut file_error = None;
    if let Ok(path) = std::env::var("LOG_FILE") {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                let writer = Mutex::new(file);
                layers.push(if json {
                    fmt::layer().json().with_writer(writer).boxed()
                } else {
                    fmt::layer().with_ansi(false).with_writer(writer).boxed()
                });
            }
            Err(e) => file_error = Some(format!("Cannot open log file {}: {}", path, e)),
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .ok();

    if let Some(message) = file_error {
        tracing::warn!("{}", message);
    }
}

/// Map a `LOG_LEVEL` value to a filter directive.
fn level_directive(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" | "WARNING" => Some("warn"),
        "ERROR" | "CRITICAL" => Some("error"),
        _ => None,
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("WARNING"), Some("warn"));
        assert_eq!(level_directive("critical"), Some("error"));
        assert_eq!(level_directive(" Info "), Some("info"));
        assert_eq!(level_directive("verbose"), None);
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("true"));
        assert!(is_truthy("1"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }
}
