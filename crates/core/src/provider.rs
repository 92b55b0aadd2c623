//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to park a large context server-side (a prompt
//! cache) and how to generate a response, either against such a cache or
//! with the full context inline.
//!
//! Implementations: Gemini (REST). Tests use in-process fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProviderError;

/// How the backend should shape its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free-form text (usually Markdown).
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

impl ResponseFormat {
    /// The MIME type the backend is asked to produce, if any.
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            ResponseFormat::Text => None,
            ResponseFormat::Json => Some("application/json"),
        }
    }
}

/// Request to create a server-side cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRequest {
    /// The model the cache is bound to.
    pub model: String,

    /// Content parts to cache (the serialized codebase).
    pub contents: Vec<String>,

    /// How long the backend should keep the entry.
    pub ttl: Duration,
}

/// An opaque reference to context held by the backend.
///
/// Never persisted locally; it simply stops working once the backend
/// expires it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHandle {
    /// Backend identifier, e.g. `cachedContents/abc123`.
    pub name: String,

    /// Requested time-to-live.
    pub ttl: Duration,

    /// When the handle was obtained.
    pub created_at: DateTime<Utc>,
}

impl CacheHandle {
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            ttl,
            created_at: Utc::now(),
        }
    }

    /// When the backend is expected to drop the entry.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        self.created_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// A generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The model to use (e.g., "gemini-1.5-flash-001")
    pub model: String,

    /// Ordered text parts of the user turn.
    pub contents: Vec<String>,

    /// Cache to resolve the context from, if one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_content: Option<String>,

    /// Requested output shape.
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The generated text, verbatim.
    pub text: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// The core Provider trait.
///
/// The cache coordinator calls `create_cache()` and `generate()` without
/// knowing which backend is behind them.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini").
    fn name(&self) -> &str;

    /// Park `request.contents` server-side and return a handle to it.
    async fn create_cache(
        &self,
        request: CacheRequest,
    ) -> std::result::Result<CacheHandle, ProviderError>;

    /// Send a request and get a complete response.
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, ProviderError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_format_has_mime_type() {
        assert_eq!(ResponseFormat::Json.mime_type(), Some("application/json"));
        assert_eq!(ResponseFormat::Text.mime_type(), None);
        assert_eq!(ResponseFormat::default(), ResponseFormat::Text);
    }

    #[test]
    fn cache_handle_expiry_follows_ttl() {
        let handle = CacheHandle::new("cachedContents/abc", Duration::from_secs(600 * 60));
        let lifetime = handle.expires_at() - handle.created_at;
        assert_eq!(lifetime.num_minutes(), 600);
    }

    #[test]
    fn generate_request_omits_missing_cache() {
        let req = GenerateRequest {
            model: "gemini-1.5-flash-001".into(),
            contents: vec!["hi".into()],
            cached_content: None,
            response_format: ResponseFormat::Text,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("cached_content"));
        assert!(json.contains("\"text\""));
    }
}
