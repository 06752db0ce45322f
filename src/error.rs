use std::path::PathBuf;

use thiserror::Error;

/// Failures while resolving or persisting the profile configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write configuration file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration written to {} did not read back intact", path.display())]
    Verify { path: PathBuf },

    #[error("failed to encode configuration")]
    Encode(#[from] serde_json::Error),

    #[error("failed to read interactive input")]
    Input(#[source] std::io::Error),

    #[error("input closed while waiting for '{0}'")]
    InputClosed(String),

    #[error("profile '{0}' not found")]
    ProfileNotFound(String),

    #[error("no default profile set")]
    NoDefaultProfile,

    #[error("invalid endpoint for profile: {0}")]
    InvalidEndpoint(String),
}

/// Failures while issuing an authenticated call.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl CallError {
    pub fn is_timeout(&self) -> bool {
        match self {
            CallError::Transport { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}
