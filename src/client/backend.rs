//! Upload, analysis and cleanup backend client.

use crate::client::session::SessionContext;
use crate::config::BackendConfig;
use crate::error::TransportError;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    session_id: Value,
}

/// Client for the document backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    timeout_seconds: u64,
    allowed_extensions: Vec<String>,
    http_client: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, TransportError> {
        let base_url = config.api_url.trim_end_matches('/').to_string();
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| TransportError::Request {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            base_url,
            timeout_seconds: config.timeout_seconds,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Reject documents whose extension is not accepted for upload.
    pub fn check_document(&self, path: &Path) -> Result<(), TransportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if self.allowed_extensions.iter().any(|a| *a == ext) {
            Ok(())
        } else {
            Err(TransportError::UnsupportedDocument {
                path: path.display().to_string(),
                allowed: self.allowed_extensions.join(", "),
            })
        }
    }

    /// Upload a document and return the new session.
    pub async fn upload(&self, path: &Path) -> Result<SessionContext, TransportError> {
        self.check_document(path)?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| TransportError::Document {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let url = self.url("/api/upload");
        info!("Uploading {} ({} bytes) to {}", file_name, bytes.len(), url);

        let form = Form::new().part("rfp_file", Part::bytes(bytes).file_name(file_name));
        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, self.timeout_seconds, e))?;

        let body = self.read_json(&url, response).await?;
        let parsed: UploadResponse =
            serde_json::from_value(body).map_err(|e| TransportError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        // The backend issues numeric-looking ids; accept either JSON type.
        let raw_id = match parsed.session_id {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        };
        let session = SessionContext::new(raw_id).ok_or_else(|| TransportError::Decode {
            url: url.clone(),
            reason: "empty session_id".to_string(),
        })?;

        info!("Upload accepted, session {}", session);
        Ok(session)
    }

    /// Request the preliminary analysis for a session.
    pub async fn analyze(&self, session: &SessionContext) -> Result<Value, TransportError> {
        let url = self.url("/api/analyze");
        info!("Requesting analysis for session {}", session);

        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "session_id": session.session_id }))
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, self.timeout_seconds, e))?;

        self.read_json(&url, response).await
    }

    /// Release the backend's state for a session. Returns the backend's
    /// confirmation message.
    pub async fn cleanup(&self, session: &SessionContext) -> Result<String, TransportError> {
        let url = self.url("/api/cleanup");
        info!("Cleaning up session {}", session);

        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "session_id": session.session_id }))
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, self.timeout_seconds, e))?;

        let body = self.read_json(&url, response).await?;
        Ok(body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("session cleaned up")
            .to_string())
    }

    async fn read_json(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> Result<Value, TransportError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(url, self.timeout_seconds, e))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: error_message(&text),
            });
        }

        debug!("{} returned {} bytes", url, text.len());
        serde_json::from_str(&text).map_err(|e| TransportError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// The backend reports failures as `{"error": "..."}`; fall back to the
/// raw body otherwise.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}
