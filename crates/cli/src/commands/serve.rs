//! `contextmesh serve` — Start the HTTP API server.

use contextmesh_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("ContextMesh Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.model);
    if !config.has_api_key() {
        println!("   No API key set; /analyze returns placeholder results");
    }

    contextmesh_gateway::start(config).await?;

    Ok(())
}
