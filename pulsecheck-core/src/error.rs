//! Error taxonomy for pulsecheck
//!
//! Probe errors are always downgraded to a classification by the aggregator.
//! Config errors are fatal before any probing starts. Report errors are
//! reported but never stop the summary from being printed.

use std::path::PathBuf;

use thiserror::Error;

/// Why a single probe failed
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("HTTP {0}")]
    HttpStatus(u16),
    #[error("{0}")]
    Transport(String),
}

impl ProbeError {
    /// Short reason string stored on the probe result
    pub fn reason(&self) -> String {
        match self {
            ProbeError::Timeout => "timeout".into(),
            ProbeError::ConnectionRefused => "connection refused".into(),
            ProbeError::HttpStatus(code) => code.to_string(),
            ProbeError::Transport(message) => message.clone(),
        }
    }
}

/// Registry loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("no registry file found, searched: {searched:?}")]
    NotFound { searched: Vec<PathBuf> },
    #[error("service '{name}' is defined more than once")]
    DuplicateService { name: String },
    #[error("service '{name}' has invalid port {port}")]
    InvalidPort { name: String, port: u32 },
    #[error("service '{name}' health path '{path}' must start with '/'")]
    InvalidHealthPath { name: String, path: String },
    #[error("invalid setting {setting}: {message}")]
    InvalidSetting { setting: String, message: String },
}

/// Report persistence errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}
