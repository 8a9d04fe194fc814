//! ChartInk Webhook Server
//!
//! Receives screener alerts from ChartInk and stores them in Supabase.

use anyhow::{Context, Result};
use chartink_core::{AppContext, WebhookApiServer, WebhookConfig};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real deployments set the environment directly
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {}", e);
        }
    }

    info!("🚀 Starting ChartInk Webhook Server...");

    let config = WebhookConfig::from_env().context("invalid server configuration")?;
    let context = AppContext::from_config(config)?;

    let server = WebhookApiServer::new(context);
    server
        .run_until(async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("🛑 Shutdown signal received...");
        })
        .await?;

    info!("✅ ChartInk Webhook Server shutdown complete");
    Ok(())
}
