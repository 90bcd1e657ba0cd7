// SPDX-License-Identifier: MIT

//! Gemini API client for remote content classification

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::ClassificationErrorKind;
use crate::{Result, VetterError};

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    /// Create a new Gemini client with a per-call timeout
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| VetterError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt and return the raw response text.
    ///
    /// All failures map to `VetterError::Classification` so callers can
    /// recover at the batch boundary: 429 is RateLimited, 401/403 is
    /// AuthFailed, transport errors and timeouts are Timeout, anything
    /// else is Malformed.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        debug!("Sending request to Gemini: model={}", self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                // Timeouts and other transport failures get the same handling
                VetterError::classification(
                    ClassificationErrorKind::Timeout,
                    format!("Request failed: {}", e),
                )
            })?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(VetterError::classification(
                    ClassificationErrorKind::RateLimited,
                    "Gemini rate limit exceeded",
                ));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(VetterError::classification(
                    ClassificationErrorKind::AuthFailed,
                    format!("Gemini rejected credentials ({})", response.status()),
                ));
            }
            status if !status.is_success() => {
                return Err(VetterError::classification(
                    ClassificationErrorKind::Malformed,
                    format!("Gemini returned status {}", status),
                ));
            }
            _ => {}
        }

        let result: GenerateResponse = response.json().await.map_err(|e| {
            VetterError::classification(
                ClassificationErrorKind::Malformed,
                format!("Unparseable response body: {}", e),
            )
        })?;

        let text = result
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(VetterError::classification(
                ClassificationErrorKind::Malformed,
                "Response contained no candidates",
            ));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_deserialization() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "[]"}]}}
            ]
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].content.parts[0].text, "[]");
    }

    #[test]
    fn test_empty_response_deserialization() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
