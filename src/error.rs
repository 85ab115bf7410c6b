//! Crate-wide error types.

use thiserror::Error;

use std::path::PathBuf;

pub type TestprofResult<T> = Result<T, TestprofError>;

#[derive(Debug, Error)]
pub enum TestprofError {
    #[error("profiler unavailable: {0}")]
    ProfilerUnavailable(String),

    #[error("invalid target directory {}: {reason}", path.display())]
    InvalidTargetDirectory { path: PathBuf, reason: String },

    #[error("malformed edge key {0:?} (expected exactly one `==>` separator)")]
    MalformedEdgeKey(String),

    #[error("sampler error: {0}")]
    Sampler(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
