//! Extraction-normalization client.
//!
//! Sends the backend's preliminary analysis to an Ollama model together
//! with the canonical report schema and returns the model's raw reply. The
//! reply is handed to the normalizer untouched.

use crate::config::ModelConfig;
use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Message in the chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Client for the extraction model.
#[derive(Debug, Clone)]
pub struct Extractor {
    config: ModelConfig,
    http_client: reqwest::Client,
}

impl Extractor {
    pub fn new(config: ModelConfig) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| TransportError::Request {
                url: config.ollama_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Ask the model to structure `preliminary` into the report schema.
    pub async fn extract(&self, preliminary: &Value) -> Result<String, TransportError> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));
        let prompt = build_prompt(preliminary);

        let request = OllamaChatRequest {
            model: self.config.name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        info!("Sending extraction request to {} ({})", url, self.config.name);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, self.config.timeout_seconds, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: OllamaChatResponse =
            response.json().await.map_err(|e| TransportError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            "Extraction reply: {} characters",
            chat_response.message.content.len()
        );
        Ok(chat_response.message.content)
    }
}

/// Build the user prompt around the preliminary analysis.
pub fn build_prompt(preliminary: &Value) -> String {
    let mut prompt = String::new();
    prompt.push_str("Extract and structure the following RFP (Request for Proposal) data into a JSON object according to this schema:\n\n");
    prompt.push_str(REPORT_SCHEMA);
    prompt.push_str("\n\nPopulate the structure as completely as the data allows. ");
    prompt.push_str("Use only the listed values for status, riskLevel, category and requirementType fields.\n\n");
    prompt.push_str("=== RFP DATA ===\n");
    prompt.push_str(&preliminary.to_string());
    prompt.push_str("\n=== END OF RFP DATA ===\n\n");
    prompt.push_str("Return only the JSON object with no additional text or explanations.");
    prompt
}

const SYSTEM_PROMPT: &str = "You are a procurement analyst. You convert preliminary RFP analyses into a single JSON object that follows the schema you are given exactly. You never add commentary outside the JSON object.";

const REPORT_SCHEMA: &str = r#"{
  "id": "string - RFP ID number",
  "title": "string - title of the RFP",
  "agency": "string - requesting agency name",
  "date": "string - YYYY-MM-DD",
  "submissionDeadline": "string - YYYY-MM-DDThh:mm:ss",
  "compliance": {
    "overallStatus": "boolean - true if all critical requirements are met",
    "checks": [
      {
        "id": "number",
        "category": "string - e.g. 'Legal', 'Financial'",
        "requirement": "string",
        "status": "one of 'met', 'not-met', 'complete', 'in-progress', 'pending'",
        "evidence": "string",
        "critical": "boolean - true if mandatory"
      }
    ]
  },
  "eligibility": {
    "proceed": "boolean",
    "criteria": [
      {
        "id": "number",
        "requirement": "string",
        "status": "one of 'met', 'not-met', 'complete', 'in-progress', 'pending'",
        "evidence": "string",
        "critical": "boolean"
      }
    ]
  },
  "checklist": {
    "items": [
      {
        "id": "string - e.g. 'CL-1'",
        "title": "string",
        "status": "one of 'complete', 'in-progress', 'pending'",
        "deadline": "string - YYYY-MM-DD",
        "assigned": "string - department or person responsible",
        "requirementType": "one of 'format', 'content', 'attachment'",
        "details": "string"
      }
    ]
  },
  "risks": [
    {
      "id": "number",
      "category": "one of 'contractual', 'financial', 'technical', 'operational'",
      "title": "string",
      "riskLevel": "one of 'high', 'medium', 'low'",
      "description": "string",
      "mitigation": "string",
      "clauseReference": "string"
    }
  ],
  "recommendations": ["string"],
  "automatedChecks": {
    "legalEligibility": "boolean",
    "certifications": ["string"],
    "missingRequirements": ["string"],
    "dealBreakers": ["string"]
  }
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_server::serve_once;
    use serde_json::json;

    fn config(url: &str) -> ModelConfig {
        ModelConfig {
            ollama_url: url.to_string(),
            timeout_seconds: 5,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt(&json!({"eligibility": "Registered in SAM.gov"}));
        assert!(prompt.contains("\"submissionDeadline\""));
        assert!(prompt.contains("\"dealBreakers\""));
        assert!(prompt.contains("Registered in SAM.gov"));
        assert!(prompt.ends_with("no additional text or explanations."));
    }

    #[tokio::test]
    async fn test_extract_returns_content() {
        let reply = json!({
            "model": "llama3.2:latest",
            "message": {"role": "assistant", "content": "```json\n{\"id\": \"RFP-1\"}\n```"},
            "done": true
        });
        let (url, request) = serve_once(200, &reply.to_string()).await;

        let extractor = Extractor::new(config(&url)).unwrap();
        let content = extractor.extract(&json!({"summary": "x"})).await.unwrap();
        assert!(content.contains("RFP-1"));

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /api/chat "));
        assert!(request.contains("\"stream\":false"));
        assert!(request.contains("llama3.2:latest"));
    }

    #[tokio::test]
    async fn test_extract_status_error() {
        let (url, _request) = serve_once(500, "model not loaded").await;
        let extractor = Extractor::new(config(&url)).unwrap();

        let err = extractor.extract(&json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 500, .. }));
    }
}
