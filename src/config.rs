use anyhow::Context;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::domain::money::currency_code;

pub const DEFAULT_EXCHANGE_RATES_URL: &str = "https://openexchangerates.org/api";
pub const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Required unless the store runs in memory.
    pub database_url: Option<String>,
    pub base_currency: String,
    pub open_exchange_app_id: Option<String>,
    pub exchange_rates_url: String,
    pub rate_lookup_timeout_ms: u64,
    pub stripe_api_key: Option<String>,
    pub stripe_api_url: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            server_port: non_empty("SERVER_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: non_empty("DATABASE_URL"),
            base_currency: non_empty("BASE_CURRENCY")
                .unwrap_or_else(|| "USD".to_string())
                .trim()
                .to_uppercase(),
            open_exchange_app_id: non_empty("OPEN_EXCHANGE_APP_ID"),
            exchange_rates_url: non_empty("EXCHANGE_RATES_URL")
                .unwrap_or_else(|| DEFAULT_EXCHANGE_RATES_URL.to_string()),
            rate_lookup_timeout_ms: non_empty("RATE_LOOKUP_TIMEOUT_MS")
                .unwrap_or_else(|| "5000".to_string())
                .parse()
                .context("RATE_LOOKUP_TIMEOUT_MS must be a number of milliseconds")?,
            stripe_api_key: non_empty("STRIPE_API_KEY"),
            stripe_api_url: non_empty("STRIPE_API_URL")
                .unwrap_or_else(|| DEFAULT_STRIPE_API_URL.to_string()),
            log_format: match non_empty("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        })
    }

    pub fn rate_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.rate_lookup_timeout_ms)
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if currency_code(&self.base_currency).is_none() {
            anyhow::bail!("BASE_CURRENCY must be a 3-letter currency code, got {}", self.base_currency);
        }
        if self.rate_lookup_timeout_ms == 0 {
            anyhow::bail!("RATE_LOOKUP_TIMEOUT_MS must be greater than 0");
        }

        url::Url::parse(&self.exchange_rates_url).context("EXCHANGE_RATES_URL is not a valid URL")?;
        url::Url::parse(&self.stripe_api_url).context("STRIPE_API_URL is not a valid URL")?;
        if let Some(database_url) = &self.database_url {
            url::Url::parse(database_url).context("DATABASE_URL is not a valid URL")?;
        }

        Ok(())
    }
}
