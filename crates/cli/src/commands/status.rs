//! `contextmesh status` — Show configuration status.

use contextmesh_config::AppConfig;
use contextmesh_core::Provider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("ContextMesh Status");
    println!("==================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Model:        {}", config.model);
    println!(
        "  API key:      {}",
        if config.has_api_key() { "configured" } else { "not set (placeholder mode)" }
    );
    if let Some(url) = &config.api_url {
        println!("  API URL:      {url}");
    }
    println!("  Cache TTL:    {} min", config.cache_ttl_minutes);
    println!("  Timeout:      {}s", config.request_timeout_secs);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!("  CORS origins: {}", config.gateway.allowed_origins.join(", "));
    if !config.ingest.extra_patterns.is_empty() {
        println!("  Extra ignore: {}", config.ingest.extra_patterns.join(", "));
    }

    if let Some(provider) = contextmesh_providers::build_from_config(&config) {
        report_backend(provider.as_ref()).await;
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file at {}; using defaults", config_path.display());
    }

    Ok(())
}

async fn report_backend(provider: &dyn Provider) {
    match provider.health_check().await {
        Ok(true) => println!("  Backend:      {} reachable", provider.name()),
        Ok(false) => println!(
            "  Backend:      {} rejected the request (check the API key)",
            provider.name()
        ),
        Err(e) => println!("  Backend:      {} unreachable: {e}", provider.name()),
    }
}
