//! pdf-tables server binary
//!
//! Run with: cargo run -p pdf-tables --bin pdf-tables-server -- --config pdf-tables.toml

use clap::Parser;
use pdf_tables::{config::AppConfig, server::PdfTablesServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pdf-tables-server", version, about = "PDF table extraction server")]
struct Args {
    /// TOML configuration file (overrides PDF_TABLES_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_tables=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Database: {}", config.storage.database_path.display());
    tracing::info!("  - Uploads: {}", config.storage.upload_dir.display());
    tracing::info!("  - Table layout: {:?}", config.ingestion.table_layout);
    if let Some(dir) = &config.extraction.json_output_dir {
        tracing::info!("  - JSON previews: {}", dir.display());
    }

    let server = PdfTablesServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
