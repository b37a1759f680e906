//! Error types for engine API calls.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The configured host is not a `unix://`, `tcp://` or `http://` address.
    #[error("invalid engine endpoint {0:?}")]
    InvalidEndpoint(String),

    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error talking to the engine: {0}")]
    Io(#[from] io::Error),

    /// The engine sent something that is not a well-formed HTTP response.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The engine answered with a 4xx/5xx status.
    #[error("engine returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl Error {
    /// HTTP status of an [`Error::Api`], if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
