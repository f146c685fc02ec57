//! Command-line entry point.
//!
//! Commands:
//!   serve   - Start the admin HTTP surface and delivery scheduler (default)
//!   migrate - Run database migrations only

use anyhow::Result;
use clap::{Parser, Subcommand};
use scim_provisioning_core::{config::Config, migration, server, telemetry};
use tracing::info;

#[derive(Parser)]
#[command(name = "scim-provisioning-core")]
#[command(about = "SCIM v2 outbound provisioning core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the admin HTTP surface and delivery scheduler
    Serve,
    /// Run database migrations only
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let prometheus_handle = telemetry::init(&config.telemetry);

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Migrate) => {
            info!("running database migrations...");
            migration::run_migrations(&config).await?;
            info!("migrations completed successfully");
        }
        Some(Commands::Serve) | None => {
            info!("starting SCIM provisioning core");
            info!(addr = %config.http_addr(), "admin HTTP surface will listen here");
            server::run(config, prometheus_handle).await?;
        }
    }

    Ok(())
}
