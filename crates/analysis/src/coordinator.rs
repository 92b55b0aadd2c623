//! Cache-aware submission.
//!
//! The first request parks the document in a server-side cache and every
//! later request sends only the prompt, referencing the cache by name. If
//! the cache cannot be created the full document goes inline instead.
//!
//! ```text
//! analyze(document, prompt, instruction)
//!   ├─ no backend        → placeholder text
//!   ├─ lock CacheState
//!   │    └─ empty slot   → create_cache(document) → store handle (or warn)
//!   │                      (skipped for an empty document)
//!   ├─ handle present    → generate([prompt], cached_content = handle)
//!   └─ no handle         → generate([instruction, …, document, …, prompt])
//! ```
//!
//! The handle is never invalidated locally. A different document sent
//! while the handle is alive is answered against the cached one until the
//! backend expires it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use contextmesh_config::AppConfig;
use contextmesh_core::{
    CacheHandle, CacheRequest, CancellationToken, GenerateRequest, Provider, ProviderError,
    ResponseFormat,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::shaping;

const MOCK_ANALYSIS: &str = r####"```json
{
  "summary": "### Mock Analysis (No API Key)\n\nSystem detected missing API Key. Returning simulated analysis.",
  "health_scores": [
    {"metric": "Modularity", "score": "A", "value": 90},
    {"metric": "Documentation", "score": "B", "value": 75},
    {"metric": "Test Coverage", "score": "C", "value": 45}
  ],
  "refactor_suggestions": [
     {"file": "backend/main.py", "issue": "Add Error Handling", "severity": "Medium"}
  ]
}
```"####;

const MISSING_KEY: &str = "Error: GOOGLE_API_KEY not set.";

/// The process-wide cache slot.
///
/// Holds at most one handle. Share it by `Arc` between coordinators that
/// should reuse the same remote cache.
#[derive(Debug, Default)]
pub struct CacheState {
    slot: Mutex<Option<CacheHandle>>,
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle currently held, if any.
    pub async fn current(&self) -> Option<CacheHandle> {
        self.slot.lock().await.clone()
    }
}

/// Per-call limits.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Overrides the coordinator's default deadline.
    pub deadline: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

/// How a result was produced.
#[derive(Debug, Clone)]
pub enum Submission {
    /// No backend configured.
    Placeholder,
    /// Prompt only, against a server-side cache.
    Cached { cache: CacheHandle },
    /// Full document sent with the prompt.
    Inline,
    /// The backend call failed; the text describes the error.
    Failed { error: ProviderError },
}

/// Result text plus provenance.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub text: String,
    pub submission: Submission,
    pub format: ResponseFormat,
}

impl AnalysisOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self.submission, Submission::Failed { .. })
    }
}

/// Submits analysis requests, creating the remote cache on first use.
pub struct CacheCoordinator {
    provider: Option<Arc<dyn Provider>>,
    cache: Arc<CacheState>,
    model: String,
    ttl: Duration,
    deadline: Option<Duration>,
}

impl CacheCoordinator {
    /// Create a coordinator. `provider = None` means placeholder mode.
    pub fn new(provider: Option<Arc<dyn Provider>>, model: impl Into<String>, ttl: Duration) -> Self {
        Self {
            provider,
            cache: Arc::new(CacheState::new()),
            model: model.into(),
            ttl,
            deadline: None,
        }
    }

    /// Build the backend and settings described by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let provider = contextmesh_providers::build_from_config(config);
        if provider.is_none() {
            warn!("No API key configured (GOOGLE_API_KEY or GEMINI_API_KEY); analysis returns placeholders");
        }
        Self::new(provider, config.model.clone(), config.cache_ttl())
    }

    /// Share a cache slot with other coordinators.
    pub fn with_cache_state(mut self, cache: Arc<CacheState>) -> Self {
        self.cache = cache;
        self
    }

    /// Default deadline for every call.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cache_state(&self) -> &Arc<CacheState> {
        &self.cache
    }

    pub fn has_backend(&self) -> bool {
        self.provider.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Analyze and return the result text.
    ///
    /// Never fails: backend errors come back as text.
    pub async fn analyze(&self, document: &str, prompt: &str, instruction: &str) -> String {
        self.analyze_with(document, prompt, instruction, &SubmitOptions::default())
            .await
            .text
    }

    /// Analyze with an explicit deadline or cancellation token.
    pub async fn analyze_with(
        &self,
        document: &str,
        prompt: &str,
        instruction: &str,
        options: &SubmitOptions,
    ) -> AnalysisOutcome {
        let format = shaping::response_format(instruction);

        let Some(provider) = &self.provider else {
            let text = match format {
                ResponseFormat::Json => MOCK_ANALYSIS,
                ResponseFormat::Text => MISSING_KEY,
            };
            return AnalysisOutcome {
                text: text.to_string(),
                submission: Submission::Placeholder,
                format,
            };
        };

        let deadline = options.deadline.or(self.deadline);
        let submit = self.submit(provider.as_ref(), document, prompt, instruction, format);

        match bounded(submit, deadline, options.cancel.as_ref()).await {
            Ok((text, submission)) => AnalysisOutcome {
                text,
                submission,
                format,
            },
            Err(error) => {
                warn!(provider = provider.name(), error = %error, "Analysis request failed");
                AnalysisOutcome {
                    text: format!("Error interacting with {}: {error}", provider.name()),
                    submission: Submission::Failed { error },
                    format,
                }
            }
        }
    }

    async fn submit(
        &self,
        provider: &dyn Provider,
        document: &str,
        prompt: &str,
        instruction: &str,
        format: ResponseFormat,
    ) -> Result<(String, Submission), ProviderError> {
        let cache = self.ensure_cache(provider, document).await;

        let request = match &cache {
            Some(handle) => GenerateRequest {
                model: self.model.clone(),
                contents: vec![prompt.to_string()],
                cached_content: Some(handle.name.clone()),
                response_format: format,
            },
            None => {
                info!(chars = document.len(), "Cache not available, sending full context");
                GenerateRequest {
                    model: self.model.clone(),
                    contents: shaping::inline_contents(instruction, document, prompt),
                    cached_content: None,
                    response_format: format,
                }
            }
        };

        let response = provider.generate(request).await?;
        let submission = match cache {
            Some(cache) => Submission::Cached { cache },
            None => Submission::Inline,
        };
        Ok((response.text, submission))
    }

    /// Return the stored handle, creating one first if the slot is empty
    /// and there is a document to cache.
    ///
    /// The lock is held across creation so concurrent first calls create
    /// exactly one cache.
    async fn ensure_cache(&self, provider: &dyn Provider, document: &str) -> Option<CacheHandle> {
        let mut slot = self.cache.slot.lock().await;
        if let Some(handle) = slot.as_ref() {
            debug!(cache = %handle.name, "Using cached content");
            return Some(handle.clone());
        }

        // An empty document would pin an empty context for every later call.
        if document.is_empty() {
            debug!("Empty document, not creating a context cache");
            return None;
        }

        info!(
            provider = provider.name(),
            model = %self.model,
            chars = document.len(),
            "Creating context cache"
        );
        let request = CacheRequest {
            model: self.model.clone(),
            contents: vec![document.to_string()],
            ttl: self.ttl,
        };

        match provider.create_cache(request).await {
            Ok(handle) => {
                info!(cache = %handle.name, expires_at = %handle.expires_at(), "Context cache created");
                *slot = Some(handle.clone());
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Failed to create context cache");
                None
            }
        }
    }
}

/// Run `fut` under an optional deadline, racing an optional cancel token.
async fn bounded<F, T>(
    fut: F,
    deadline: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    let timed = async {
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "no response within {}ms",
                    limit.as_millis()
                ))),
            },
            None => fut.await,
        }
    };

    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(ProviderError::Cancelled),
            result = timed => result,
        },
        None => timed.await,
    }
}
