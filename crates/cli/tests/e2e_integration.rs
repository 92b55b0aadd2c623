//! End-to-end tests for the ContextMesh pipeline.
//!
//! These tests run real ingestion over a temporary tree and submit the
//! result through the cache coordinator, either to a scripted provider or
//! to the Gemini binding pointed at a mock HTTP server.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contextmesh_analysis::{CacheCoordinator, Persona, SubmitOptions, Submission};
use contextmesh_config::AppConfig;
use contextmesh_core::error::ProviderError;
use contextmesh_core::provider::{
    CacheHandle, CacheRequest, GenerateRequest, GenerateResponse, Provider,
};
use contextmesh_ingest::ContextBuilder;
use contextmesh_providers::GeminiProvider;
use mockito::Matcher;
use serde_json::json;

const MODEL: &str = "gemini-1.5-flash-001";

// ── Fixtures ─────────────────────────────────────────────────────────────

fn write(root: &Path, rel: &str, bytes: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

/// `a.txt`, `.git/config`, `node_modules/x.js`, `img.bin`.
fn reference_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"hello");
    write(dir.path(), ".git/config", b"[core]");
    write(dir.path(), "node_modules/x.js", b"module.exports = 1;");
    write(dir.path(), "img.bin", &[0x00, 0x01, 0x02]);
    dir
}

// ── Mock Provider ────────────────────────────────────────────────────────

/// Answers every request with a fixed text and records what it was sent.
#[derive(Default)]
struct ScriptedProvider {
    caches: Mutex<Vec<CacheRequest>>,
    generates: Mutex<Vec<GenerateRequest>>,
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn create_cache(&self, request: CacheRequest) -> Result<CacheHandle, ProviderError> {
        let ttl = request.ttl;
        self.caches.lock().unwrap().push(request);
        Ok(CacheHandle::new("cachedContents/e2e", ttl))
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        self.generates.lock().unwrap().push(request);
        Ok(GenerateResponse {
            text: "looks fine".into(),
            model: MODEL.into(),
        })
    }
}

// ── E2E: ingestion → coordinator ─────────────────────────────────────────

#[tokio::test]
async fn e2e_reference_tree_is_cached_once() {
    let dir = reference_tree();
    let document = ContextBuilder::new().build(dir.path()).unwrap();
    let rendered = document.render();
    assert_eq!(
        rendered,
        "<codebase>\n<file path=\"a.txt\">\nhello\n</file>\n</codebase>\n"
    );

    let provider = Arc::new(ScriptedProvider::default());
    let dyn_provider: Arc<dyn Provider> = provider.clone();
    let coordinator = CacheCoordinator::new(Some(dyn_provider), MODEL, Duration::from_secs(3600));

    let instruction = Persona::Refactorer.instruction();
    assert_eq!(coordinator.analyze(&rendered, "first", instruction).await, "looks fine");
    assert_eq!(coordinator.analyze(&rendered, "second", instruction).await, "looks fine");

    let caches = provider.caches.lock().unwrap();
    assert_eq!(caches.len(), 1);
    assert_eq!(caches[0].contents, vec![rendered.clone()]);

    let generates = provider.generates.lock().unwrap();
    assert_eq!(generates.len(), 2);
    assert_eq!(generates[1].contents, vec!["second".to_string()]);
    assert_eq!(generates[1].cached_content.as_deref(), Some("cachedContents/e2e"));
}

#[tokio::test]
async fn e2e_no_key_never_touches_network() {
    let dir = reference_tree();
    let document = ContextBuilder::new().build(dir.path()).unwrap();

    let coordinator = CacheCoordinator::from_config(&AppConfig::default());
    let outcome = coordinator
        .analyze_with(
            &document.render(),
            "Assess",
            Persona::Architect.instruction(),
            &SubmitOptions::default(),
        )
        .await;

    assert!(matches!(outcome.submission, Submission::Placeholder));
    assert!(outcome.text.contains("\"health_scores\""));
}

// ── E2E: ingestion → coordinator → Gemini REST ───────────────────────────

#[tokio::test]
async fn e2e_gemini_cache_then_prompt_only() {
    let dir = reference_tree();
    let rendered = ContextBuilder::new().build(dir.path()).unwrap().render();

    let mut server = mockito::Server::new_async().await;
    let cache_mock = server
        .mock("POST", "/v1beta/cachedContents")
        .match_header("x-goog-api-key", "e2e-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "models/gemini-1.5-flash-001",
            "ttl": "36000s"
        })))
        .with_status(200)
        .with_body(r#"{"name": "cachedContents/live"}"#)
        .expect(1)
        .create_async()
        .await;
    let generate_mock = server
        .mock("POST", "/v1beta/models/gemini-1.5-flash-001:generateContent")
        .match_body(Matcher::PartialJson(json!({
            "cachedContent": "cachedContents/live",
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .with_status(200)
        .with_body(
            json!({"candidates": [{"content": {"parts": [{"text": "{\"summary\":\"ok\"}"}]}}]})
                .to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let config = AppConfig {
        api_key: Some("e2e-key".into()),
        api_url: Some(server.url()),
        ..AppConfig::default()
    };
    let coordinator = CacheCoordinator::from_config(&config);
    assert!(coordinator.has_backend());

    let instruction = Persona::Architect.instruction();
    let first = coordinator.analyze(&rendered, "Assess", instruction).await;
    let second = coordinator.analyze(&rendered, "Again", instruction).await;

    assert_eq!(first, "{\"summary\":\"ok\"}");
    assert_eq!(second, first);
    cache_mock.assert_async().await;
    generate_mock.assert_async().await;
}

#[tokio::test]
async fn e2e_gemini_cache_rejected_goes_inline() {
    let dir = reference_tree();
    let rendered = ContextBuilder::new().build(dir.path()).unwrap().render();

    let mut server = mockito::Server::new_async().await;
    let _cache_mock = server
        .mock("POST", "/v1beta/cachedContents")
        .with_status(400)
        .with_body("Cached content is too small")
        .create_async()
        .await;
    let inline_mock = server
        .mock("POST", "/v1beta/models/gemini-1.5-flash-001:generateContent")
        .match_body(Matcher::Json(json!({
            "contents": [{"role": "user", "parts": [
                {"text": "Be brief."},
                {"text": "Here is the codebase context:"},
                {"text": rendered},
                {"text": "--- End of Codebase ---"},
                {"text": "User Query:"},
                {"text": "Summarize"}
            ]}]
        })))
        .with_status(200)
        .with_body(json!({"candidates": [{"content": {"parts": [{"text": "summary"}]}}]}).to_string())
        .create_async()
        .await;

    let provider: Arc<dyn Provider> = Arc::new(GeminiProvider::new("k").with_base_url(server.url()));
    let coordinator = CacheCoordinator::new(Some(provider), MODEL, Duration::from_secs(60));

    let outcome = coordinator
        .analyze_with(&rendered, "Summarize", "Be brief.", &SubmitOptions::default())
        .await;

    assert_eq!(outcome.text, "summary");
    assert!(matches!(outcome.submission, Submission::Inline));
    inline_mock.assert_async().await;
}

#[tokio::test]
async fn e2e_gemini_auth_failure_is_reported_as_text() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", Matcher::Any)
        .with_status(401)
        .create_async()
        .await;

    let provider: Arc<dyn Provider> = Arc::new(GeminiProvider::new("bad").with_base_url(server.url()));
    let coordinator = CacheCoordinator::new(Some(provider), MODEL, Duration::from_secs(60));

    let text = coordinator.analyze("<codebase>\n</codebase>\n", "q", "x").await;
    assert_eq!(
        text,
        "Error interacting with gemini: Authentication failed: Invalid Gemini API key"
    );
}
