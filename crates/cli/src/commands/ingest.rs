//! `contextmesh ingest` — Print or save a context document.

use std::path::PathBuf;

use contextmesh_config::AppConfig;
use contextmesh_core::CancellationToken;
use contextmesh_ingest::ContextBuilder;

pub async fn run(path: PathBuf, output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let builder = ContextBuilder::new()
        .with_extra_patterns(config.ingest.extra_patterns)
        .with_cancellation(cancel);
    let document = tokio::task::spawn_blocking(move || builder.build(&path)).await??;
    let rendered = document.render();

    match output {
        Some(file) => {
            std::fs::write(&file, &rendered)
                .map_err(|e| format!("Failed to write {}: {e}", file.display()))?;
            let stats = document.stats();
            eprintln!(
                "Wrote {} ({} files, {} chars; skipped {} binary, {} excluded, {} dirs pruned)",
                file.display(),
                stats.files_included,
                rendered.len(),
                stats.binary_skipped,
                stats.files_excluded,
                stats.dirs_pruned,
            );
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
