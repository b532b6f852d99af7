use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::providers::{CustomerDirectory, CustomerLookupError};

/// Response from Stripe `GET /v1/customers/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerResponse {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    pub email: Option<String>,
}

/// HTTP client for the Stripe customers API
#[derive(Clone)]
pub struct StripeCustomerClient {
    client: Client,
    base_url: String,
    api_key: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl StripeCustomerClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        StripeCustomerClient {
            client,
            base_url,
            api_key,
            circuit_breaker,
        }
    }

    pub async fn get_customer(&self, customer_id: &str) -> Result<CustomerResponse, CustomerLookupError> {
        let url = format!(
            "{}/v1/customers/{}",
            self.base_url.trim_end_matches('/'),
            customer_id
        );
        let request = self.client.get(&url).bearer_auth(&self.api_key);
        let id = customer_id.to_string();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = request.send().await?;

                if response.status() == StatusCode::NOT_FOUND {
                    return Err(CustomerLookupError::NotFound(id));
                }
                if !response.status().is_success() {
                    return Err(CustomerLookupError::Status(response.status().as_u16()));
                }

                let customer = response.json::<CustomerResponse>().await?;
                Ok(customer)
            })
            .await;

        match result {
            Ok(customer) => Ok(customer),
            Err(FailsafeError::Rejected) => Err(CustomerLookupError::CircuitBreakerOpen(
                "Stripe API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl CustomerDirectory for StripeCustomerClient {
    async fn customer_email(&self, customer_id: &str) -> Result<Option<String>, CustomerLookupError> {
        let customer = self.get_customer(customer_id).await?;
        if customer.deleted {
            return Ok(None);
        }
        Ok(customer.email)
    }
}
