//! Error types for autocat

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Firefly III answered with a non-success status
    #[error("Error while communicating with Firefly III: {status} - {body}")]
    Ledger { status: u16, url: String, body: String },

    /// The model provider failed, either with an HTTP status or without one
    /// (transport failure, provider error object, unusable answer)
    #[error("Error while communicating with the model: {} - {body}", fmt_status(.status))]
    Model { status: Option<u16>, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// HTTP status attached to a boundary error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Ledger { status, .. } => Some(*status),
            Error::Model { status, .. } => *status,
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Model error without an HTTP envelope
    pub(crate) fn model(message: impl Into<String>) -> Self {
        Error::Model {
            status: None,
            body: message.into(),
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "null".to_string(), |s| s.to_string())
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_display() {
        let err = Error::Ledger {
            status: 401,
            url: "http://firefly/api/v1/categories".into(),
            body: "Unauthenticated.".into(),
        };
        assert_eq!(
            err.to_string(),
            "Error while communicating with Firefly III: 401 - Unauthenticated."
        );
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_model_error_without_status() {
        let err = Error::model("connection refused");
        assert_eq!(
            err.to_string(),
            "Error while communicating with the model: null - connection refused"
        );
        assert_eq!(err.status(), None);
    }
}
