//! Local backend: an Ollama inference server on localhost.
//!
//! Same prompt contract as the hosted backend, but the call is plain HTTP
//! with no credentials — useful for analysing documents that must not leave
//! the machine. Rate-limit classification still applies (a proxy in front
//! of the server may return 429), it is just unlikely locally.

use crate::backend::{classify_status, http_client, transport_error, ModelBackend};
use crate::config::AnalysisConfig;
use crate::error::{AnalyzeError, BackendError};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_MODEL: &str = "llama3.2";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

pub struct OllamaBackend {
    client: reqwest::Client,
    model: String,
    endpoint: String,
    timeout_secs: u64,
}

impl OllamaBackend {
    pub fn new(
        model: impl Into<String>,
        endpoint: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, AnalyzeError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            model: model.into(),
            endpoint: endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout_secs,
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalyzeError> {
        Self::new(
            config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.into()),
            config.endpoint.clone(),
            config.request_timeout_secs,
        )
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl ModelBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, BackendError>> {
        Box::pin(async move {
            let url = format!("{}/api/generate", self.endpoint);
            let body = GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            };

            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| transport_error(e, self.timeout_secs))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(classify_status(status.as_u16(), None, &body));
            }

            let parsed: GenerateResponse = response
                .json()
                .await
                .map_err(|e| BackendError::EmptyResponse(e.to_string()))?;

            if parsed.response.trim().is_empty() {
                return Err(BackendError::EmptyResponse(
                    "model returned no text".into(),
                ));
            }

            debug!("ollama: {} chars of model output", parsed.response.len());
            Ok(parsed.response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let b = OllamaBackend::new("llama3.2", Some("http://localhost:11434/".into()), 30).unwrap();
        assert_eq!(b.endpoint, "http://localhost:11434");
    }

    #[test]
    fn request_body_shape() {
        let body = GenerateRequest {
            model: "llama3.2",
            prompt: "hi",
            stream: false,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["model"], "llama3.2");
        assert_eq!(v["stream"], false);
    }

    #[test]
    fn response_parses_with_missing_field() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.response.is_empty());
    }
}
