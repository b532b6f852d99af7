use async_trait::async_trait;
use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::money::decimal_from_json;
use crate::fx::{RateError, RateSource};

/// Response from the Open Exchange Rates `latest.json` endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LatestRatesResponse {
    pub base: String,
    pub timestamp: Option<i64>,
    pub rates: HashMap<String, serde_json::Number>,
}

/// HTTP client for the Open Exchange Rates API
#[derive(Clone)]
pub struct ExchangeRateClient {
    client: Client,
    base_url: String,
    app_id: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl ExchangeRateClient {
    pub fn new(base_url: String, app_id: String, timeout: Duration) -> Self {
        Self::with_circuit_breaker(base_url, app_id, timeout, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        app_id: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        ExchangeRateClient {
            client,
            base_url,
            app_id,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// Fetches the latest rates quoted against `base`
    pub async fn latest(&self, base: &str) -> Result<LatestRatesResponse, RateError> {
        let url = format!("{}/latest.json", self.base_url.trim_end_matches('/'));
        let request = self.client.get(&url).query(&[
            ("app_id", self.app_id.as_str()),
            ("base", base),
            ("prettyprint", "false"),
            ("show_alternative", "false"),
        ]);

        let result = self
            .circuit_breaker
            .call(async move {
                let response = request.send().await?;

                if !response.status().is_success() {
                    return Err(RateError::Status(response.status().as_u16()));
                }

                let rates = response.json::<LatestRatesResponse>().await?;
                Ok(rates)
            })
            .await;

        match result {
            Ok(rates) => Ok(rates),
            Err(FailsafeError::Rejected) => Err(RateError::CircuitBreakerOpen(
                "exchange rate circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl RateSource for ExchangeRateClient {
    async fn latest_rates(&self, base: &str) -> Result<HashMap<String, BigDecimal>, RateError> {
        let response = self.latest(base).await?;

        Ok(response
            .rates
            .iter()
            .filter_map(|(code, rate)| decimal_from_json(rate).map(|r| (code.clone(), r)))
            .collect())
    }
}
