//! LLM backend bindings for ContextMesh.
//!
//! All backends implement the `contextmesh_core::Provider` trait.
//! [`build_from_config`] picks the configured one, or none when no
//! credential is available (placeholder mode).

pub mod gemini;

use std::sync::Arc;

use contextmesh_core::Provider;

pub use gemini::GeminiProvider;

/// Build the backend described by `config`.
///
/// Returns `None` when no API key is configured.
pub fn build_from_config(config: &contextmesh_config::AppConfig) -> Option<Arc<dyn Provider>> {
    let api_key = config.api_key.as_deref()?;

    let mut provider = GeminiProvider::new(api_key).with_timeout(config.request_timeout());
    if let Some(url) = &config.api_url {
        provider = provider.with_base_url(url);
    }

    Some(Arc::new(provider))
}
