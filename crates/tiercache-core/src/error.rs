use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown domain '{0}'")]
    UnknownDomain(String),

    #[error("Provider call failed: {0}")]
    Provider(String),

    #[error("Vector store failed: {0}")]
    Store(String),

    #[error("Malformed data in {}: {reason}", path.display())]
    Data { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn data(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Data { path: path.into(), reason: reason.into() }
    }

    /// Wrap an opaque collaborator error raised by an embedding provider.
    pub fn provider(err: anyhow::Error) -> Self { Self::Provider(format!("{err:#}")) }

    /// Wrap an opaque collaborator error raised by a vector store.
    pub fn store(err: anyhow::Error) -> Self { Self::Store(format!("{err:#}")) }
}

pub type Result<T> = std::result::Result<T, Error>;
