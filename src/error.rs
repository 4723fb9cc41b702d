use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// Error types that can occur while driving a session against the daemon.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Interactive login failed; the operation is not retried
    #[error("Auth error: {0}")]
    Auth(String),
    /// Malformed progress stream, embedded failure message or bad frame header
    #[error("Decode error: {0}")]
    Decode(String),
    /// I/O failure while copying the response body
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),
    /// Remote resize push failed
    #[error("Resize error: {0}")]
    Resize(String),
    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(String),
    /// The daemon answered with a non-success status
    #[error("Daemon returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    /// Configuration or credential store errors
    #[error("Config error: {0}")]
    Config(String),
}

impl SessionError {
    /// HTTP status carried by the error, if the daemon produced one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SessionError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SessionError::Status {
                status,
                message: err.to_string(),
            },
            None => SessionError::Http(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Decode(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}
