mod api_client;
mod bot;
mod config;
mod error;
mod handlers;
mod utils;

use anyhow::Result;
use config::Config;
use teloxide::prelude::*;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Starting air quality bot...");
    info!("Geocoding API: {}", config.geocoding_url);
    info!("Air quality API: {}", config.air_quality_url);
    if let Some(timeout) = config.request_timeout {
        info!("HTTP request timeout: {}s", timeout.as_secs());
    }

    let bot = Bot::new(&config.telegram_token);

    bot::start_bot(bot, config).await?;

    Ok(())
}
