//! Hosted backend: Google's generative-language REST API.
//!
//! One authenticated POST per page. The API key comes from the config or
//! the `GEMINI_API_KEY` environment variable; a missing key is fatal before
//! the first page, not a per-page fault.

use crate::backend::{classify_status, http_client, transport_error, ModelBackend};
use crate::config::AnalysisConfig;
use crate::error::{AnalyzeError, BackendError};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Low temperature: phrase extraction should copy, not compose.
const TEMPERATURE: f32 = 0.1;

pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout_secs: u64,
}

impl GeminiBackend {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, AnalyzeError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_secs,
        })
    }

    /// Build from config, reading `GEMINI_API_KEY` when no key is set.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalyzeError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AnalyzeError::MissingCredentials {
                backend: "gemini".into(),
                hint: "Set GEMINI_API_KEY in the environment or configure an API key.".into(),
            })?;

        Self::new(
            api_key,
            config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.into()),
            config.endpoint.clone(),
            config.request_timeout_secs,
        )
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl ModelBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, BackendError>> {
        Box::pin(async move {
            let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
            let body = GenerateRequest {
                contents: vec![RequestContent {
                    parts: vec![RequestPart { text: prompt }],
                }],
                generation_config: GenerationConfig {
                    temperature: TEMPERATURE,
                },
            };

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| transport_error(e, self.timeout_secs))?;

            let status = response.status();
            if !status.is_success() {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                let body = response.text().await.unwrap_or_default();
                return Err(classify_status(status.as_u16(), retry_after, &body));
            }

            let parsed: GenerateResponse = response
                .json()
                .await
                .map_err(|e| BackendError::EmptyResponse(e.to_string()))?;

            let text = parsed
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .map(|c| {
                    c.parts
                        .into_iter()
                        .filter_map(|p| p.text)
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default();

            if text.trim().is_empty() {
                return Err(BackendError::EmptyResponse(
                    "no candidate text in response".into(),
                ));
            }

            debug!("gemini: {} chars of model output", text.len());
            Ok(text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: "hi" }],
            }],
            generation_config: GenerationConfig { temperature: 0.1 },
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
        assert!((v["generationConfig"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn response_text_extraction_shape() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"[{\"phrase\":\"a\"}]"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .filter_map(|p| p.text.clone())
            .collect();
        assert!(text.contains("phrase"));
    }

    #[test]
    fn empty_candidates_parse() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
