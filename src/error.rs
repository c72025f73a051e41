//! Error taxonomy for the report engine.
//!
//! Each user action fails with exactly one of these kinds. None of them
//! invalidates an already loaded report.

use thiserror::Error;

/// Failure talking to the upload, analysis, cleanup or extraction
/// collaborators. Always retryable by the user.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot connect to {url}")]
    Connect { url: String },

    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("no session identifier available; upload a document first")]
    NoSession,

    #[error("{path} is not an accepted document (allowed: {allowed})")]
    UnsupportedDocument { path: String, allowed: String },

    #[error("failed to read document {path}: {source}")]
    Document {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Map a reqwest failure to a transport error for `url`.
    pub fn from_reqwest(url: &str, timeout_seconds: u64, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                seconds: timeout_seconds,
            }
        } else if e.is_connect() {
            TransportError::Connect {
                url: url.to_string(),
            }
        } else if e.is_decode() {
            TransportError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else {
            TransportError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Irrecoverable malformation of the extraction payload. No partial report
/// is ever produced alongside one of these.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("extraction payload is not a JSON object")]
    NotAnObject,

    #[error("extraction payload has no compliance checks array")]
    MissingChecks,

    #[error("no JSON object found in extraction response")]
    NoJsonObject,

    #[error("extraction response is not valid JSON: {reason}")]
    InvalidJson { reason: String },
}

/// Failure producing a print or archival artifact.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("report surface has not been rendered yet")]
    NotRendered,

    #[error("rasterizer failed: {0}")]
    Backend(String),

    #[error("unsupported raster image: {0}")]
    UnsupportedImage(String),

    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Any failure at the workspace boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl EngineError {
    /// Whether retrying the same action might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TransportError::Status {
            url: "http://localhost:5000/api/analyze".to_string(),
            status: 404,
            body: "Session not found or expired".to_string(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("Session not found"));

        assert_eq!(
            SchemaError::MissingChecks.to_string(),
            "extraction payload has no compliance checks array"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(EngineError::from(TransportError::NoSession).is_retryable());
        assert!(!EngineError::from(SchemaError::NotAnObject).is_retryable());
        assert!(!EngineError::from(ExportError::NotRendered).is_retryable());
    }
}
