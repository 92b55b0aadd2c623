//! `contextmesh analyze` — One-shot analysis from the terminal.

use std::path::PathBuf;

use contextmesh_analysis::{CacheCoordinator, Persona, SubmitOptions};
use contextmesh_config::AppConfig;
use contextmesh_core::CancellationToken;
use contextmesh_ingest::ContextBuilder;

pub async fn run(
    path: PathBuf,
    prompt: String,
    agent: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let builder = ContextBuilder::new()
        .with_extra_patterns(config.ingest.extra_patterns.clone())
        .with_cancellation(cancel.clone());
    let document = tokio::task::spawn_blocking(move || builder.build(&path))
        .await?
        .map_err(|e| format!("Ingestion failed: {e}"))?;

    let persona = Persona::from_name(&agent);
    let coordinator = CacheCoordinator::from_config(&config);

    eprintln!(
        "  Analyzing {} files as {persona} ({})...",
        document.len(),
        config.model
    );

    let options = SubmitOptions {
        deadline: None,
        cancel: Some(cancel),
    };
    let outcome = coordinator
        .analyze_with(&document.render(), &prompt, persona.instruction(), &options)
        .await;

    println!("{}", outcome.text);

    if outcome.is_error() {
        return Err("Analysis failed".into());
    }
    Ok(())
}
