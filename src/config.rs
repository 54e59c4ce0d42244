use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com";
pub const DEFAULT_AIR_QUALITY_URL: &str = "https://air-quality-api.open-meteo.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub geocoding_url: String,
    pub air_quality_url: String,
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let telegram_token = env::var("TELEGRAM_BOT_TOKEN")
            .or_else(|_| env::var("TG_API_TOKEN"))
            .context("TELEGRAM_BOT_TOKEN environment variable is required")?;

        let request_timeout = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("HTTP_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"))?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        Ok(Self {
            telegram_token,
            geocoding_url: env::var("GEOCODING_API_URL")
                .unwrap_or_else(|_| DEFAULT_GEOCODING_URL.to_string()),
            air_quality_url: env::var("AIR_QUALITY_API_URL")
                .unwrap_or_else(|_| DEFAULT_AIR_QUALITY_URL.to_string()),
            request_timeout,
        })
    }
}
