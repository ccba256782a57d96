use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::error;

use mtl_events::config::Config;
use mtl_events::logging;
use mtl_events::observability;
use mtl_events::pipeline::Ingester;
use mtl_events::server::{start_server, AppState};
use mtl_events::storage::{SqliteStorage, Storage};
use mtl_events::ticketmaster::{EventSource, TicketmasterClient};

#[derive(Parser)]
#[command(name = "mtl_events")]
#[command(about = "Montreal event listings ingester and read API")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (trigger, read, and health endpoints)
    Serve {
        /// Port to listen on (overrides PORT / config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one ingestion pass from the command line
    Ingest {
        /// Maximum Discovery pages to process; all reported pages when omitted
        #[arg(long)]
        max_pages: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init_logging();

    observability::metrics::init().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to initialize metrics: {}", e);
    });

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&config.database_path)?);

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            let state = AppState::new(config, storage);
            start_server(state, port).await?;
        }
        Commands::Ingest { max_pages } => {
            println!("🔄 Running Ticketmaster ingestion...");

            let source: Arc<dyn EventSource> = Arc::new(TicketmasterClient::new(
                config.ticketmaster_api_key.clone(),
                config.ticketmaster.clone(),
            ));
            let ingester = Ingester::new(source, storage);

            match ingester.run(max_pages.unwrap_or(u32::MAX)).await {
                Ok(summary) => {
                    observability::metrics::ingest::run_success();
                    println!("\n📊 Ingestion results:");
                    println!("   Events ingested: {}", summary.ingested);
                    println!("   Venues created:  {}", summary.venues_created);
                    println!(
                        "   Pages processed: {} of {} reported",
                        summary.pages_processed, summary.total_pages_reported
                    );
                }
                Err(e) => {
                    observability::metrics::ingest::run_error();
                    error!("Ingestion run failed: {}", e);
                    println!("❌ Ingestion failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
