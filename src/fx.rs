//! Conversion rates to the ledger's base currency.
//!
//! A failed lookup never fails a posting: any error, timeout, or missing
//! currency yields a rate of 1 and is logged.

use async_trait::async_trait;
use bigdecimal::{BigDecimal, One, Zero};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::domain::money::round_rate;

#[derive(Error, Debug)]
pub enum RateError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Unexpected response status: {0}")]
    Status(u16),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

/// External source of rates quoted against a base currency, expressed as
/// base-to-currency multipliers (units of currency per 1 unit of base).
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn latest_rates(&self, base: &str) -> Result<HashMap<String, BigDecimal>, RateError>;
}

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    fn base_currency(&self) -> &str;

    /// Multiplier converting one unit of `currency` into the base currency.
    async fn rate_to_base(&self, currency: &str) -> BigDecimal;
}

pub struct BaseRateProvider {
    base_currency: String,
    source: Option<Arc<dyn RateSource>>,
    timeout: Duration,
}

impl BaseRateProvider {
    pub fn new(base_currency: impl Into<String>, source: Arc<dyn RateSource>, timeout: Duration) -> Self {
        Self {
            base_currency: base_currency.into().to_uppercase(),
            source: Some(source),
            timeout,
        }
    }

    /// A provider with no rate source; every foreign currency is at parity.
    pub fn parity_only(base_currency: impl Into<String>) -> Self {
        Self {
            base_currency: base_currency.into().to_uppercase(),
            source: None,
            timeout: Duration::ZERO,
        }
    }

    async fn lookup(&self, source: &dyn RateSource, currency: &str) -> Option<BigDecimal> {
        let rates = match tokio::time::timeout(self.timeout, source.latest_rates(&self.base_currency)).await {
            Ok(Ok(rates)) => rates,
            Ok(Err(e)) => {
                tracing::error!(currency, "Error fetching exchange rates: {}", e);
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    currency,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Exchange rate lookup timed out"
                );
                return None;
            }
        };

        match rates.get(currency) {
            Some(rate) if !rate.is_zero() => Some(round_rate(&(BigDecimal::one() / rate.clone()))),
            _ => {
                tracing::warn!(currency, "Currency {} not found in exchange rates", currency);
                None
            }
        }
    }
}

#[async_trait]
impl CurrencyRateProvider for BaseRateProvider {
    fn base_currency(&self) -> &str {
        &self.base_currency
    }

    async fn rate_to_base(&self, currency: &str) -> BigDecimal {
        if currency.eq_ignore_ascii_case(&self.base_currency) {
            return BigDecimal::one();
        }

        let Some(source) = self.source.as_deref() else {
            tracing::warn!(currency, "No exchange rate source configured, using parity");
            return BigDecimal::one();
        };

        self.lookup(source, &currency.to_uppercase())
            .await
            .unwrap_or_else(BigDecimal::one)
    }
}
