//! Gemini provider implementation.
//!
//! Talks to the Generative Language REST API directly.
//!
//! Features:
//! - `x-goog-api-key` header authentication
//! - Context caching via `cachedContents` (TTL in seconds)
//! - `generateContent` either against a cache or with inline parts
//! - JSON output via `generationConfig.responseMimeType`

use async_trait::async_trait;
use contextmesh_core::error::ProviderError;
use contextmesh_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Gemini REST provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: build_client(DEFAULT_TIMEOUT),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the HTTP client timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    /// `gemini-1.5-flash-001` → `models/gemini-1.5-flash-001`.
    fn model_path(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }

    fn user_content(parts: &[String]) -> Content {
        Content {
            role: Some("user".into()),
            parts: parts
                .iter()
                .map(|text| Part {
                    text: Some(text.clone()),
                })
                .collect(),
        }
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        model: &str,
    ) -> std::result::Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid Gemini API key".into(),
            ));
        }
        if status == 404 {
            return Err(ProviderError::ModelNotFound(model.to_string()));
        }
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }

    /// Join the text parts of the first candidate.
    fn response_text(resp: GenerateContentResponse) -> std::result::Result<String, ProviderError> {
        let Some(candidate) = resp.candidates.into_iter().next() else {
            let reason = resp
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("prompt blocked: {r}"))
                .unwrap_or_else(|| "response contained no candidates".into());
            return Err(ProviderError::InvalidResponse(reason));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".into());
            return Err(ProviderError::InvalidResponse(format!(
                "candidate has no text (finish reason: {reason})"
            )));
        }

        Ok(text)
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

#[async_trait]
impl contextmesh_core::Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_cache(
        &self,
        request: CacheRequest,
    ) -> std::result::Result<CacheHandle, ProviderError> {
        let url = format!("{}/{API_VERSION}/cachedContents", self.base_url);
        let body = CreateCachedContentRequest {
            model: Self::model_path(&request.model),
            contents: vec![Self::user_content(&request.contents)],
            ttl: format!("{}s", request.ttl.as_secs()),
        };

        let chars: usize = request.contents.iter().map(String::len).sum();
        debug!(provider = "gemini", model = %request.model, chars, ttl = %body.ttl, "Creating context cache");

        let response = self.post_json(&url, &body, &request.model).await?;
        let cached: CachedContentResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse(format!(
                    "Failed to parse cachedContents response: {e}"
                )))?;

        Ok(CacheHandle::new(cached.name, request.ttl))
    }

    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, ProviderError> {
        let url = format!(
            "{}/{API_VERSION}/{}:generateContent",
            self.base_url,
            Self::model_path(&request.model)
        );

        let body = GenerateContentRequest {
            contents: vec![Self::user_content(&request.contents)],
            cached_content: request.cached_content.clone(),
            generation_config: request
                .response_format
                .mime_type()
                .map(|mime| GenerationConfig {
                    response_mime_type: mime.to_string(),
                }),
        };

        debug!(
            provider = "gemini",
            model = %request.model,
            parts = request.contents.len(),
            cached = request.cached_content.is_some(),
            "Sending generateContent request"
        );

        let response = self.post_json(&url, &body, &request.model).await?;
        let api_resp: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse(format!(
                    "Failed to parse generateContent response: {e}"
                )))?;

        let model = api_resp
            .model_version
            .clone()
            .unwrap_or_else(|| request.model.clone());
        let text = Self::response_text(api_resp)?;

        Ok(GenerateResponse { text, model })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/{API_VERSION}/models?pageSize=1", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateCachedContentRequest {
    model: String,
    contents: Vec<Content>,
    ttl: String,
}

#[derive(Debug, Deserialize)]
struct CachedContentResponse {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
