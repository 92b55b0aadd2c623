//! ContextMesh CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the HTTP gateway
//! - `ingest`   — Print or save the context document for a directory
//! - `analyze`  — One-shot analysis of a directory
//! - `status`   — Show configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "contextmesh",
    about = "ContextMesh — codebase context for LLM analysis",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Build the context document for a directory
    Ingest {
        /// Directory to ingest
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Write to a file instead of stdout (default name if no value given)
        #[arg(
            short,
            long,
            num_args = 0..=1,
            default_missing_value = contextmesh_ingest::SNAPSHOT_FILE
        )]
        output: Option<PathBuf>,
    },

    /// Analyze a directory with one of the agents
    Analyze {
        /// Directory to analyze
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Question to ask about the codebase
        #[arg(short, long)]
        prompt: String,

        /// Agent persona: architect, refactorer, documentarian
        #[arg(short, long, default_value = "architect")]
        agent: String,
    },

    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ingest { path, output } => commands::ingest::run(path, output).await?,
        Commands::Analyze {
            path,
            prompt,
            agent,
        } => commands::analyze::run(path, prompt, agent).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
