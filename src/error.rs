use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("http {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("required input file is missing: {0}")]
    MissingInput(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl HarvestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Fetch failures worth retrying on a later run: timeouts, connection
    /// errors and non-success statuses.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::HttpStatus { .. })
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
