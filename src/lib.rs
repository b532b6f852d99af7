pub mod adapters;
pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod fx;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod providers;
pub mod services;
pub mod startup;

use axum::{Router, middleware as axum_middleware, routing::{get, post}};
use std::sync::Arc;

use crate::clients::{ExchangeRateClient, StripeCustomerClient};
use crate::config::Config;
use crate::fx::{BaseRateProvider, CurrencyRateProvider};
use crate::ports::LedgerStore;
use crate::providers::{AirwallexNormalizer, Normalizer, StripeNormalizer};
use crate::services::{LedgerQueryService, PaymentQueryService, PaymentReconciler};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub reconciler: PaymentReconciler,
    pub ledger: LedgerQueryService,
    pub payments: PaymentQueryService,
    /// Reported by `/health`; `None` when foreign currencies post at parity.
    pub rate_client: Option<ExchangeRateClient>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        rates: Arc<dyn CurrencyRateProvider>,
        normalizer: Normalizer,
    ) -> Self {
        let base_currency = rates.base_currency().to_string();
        Self {
            reconciler: PaymentReconciler::new(Arc::new(normalizer), rates, store.clone()),
            ledger: LedgerQueryService::new(store.clone(), base_currency),
            payments: PaymentQueryService::new(store.clone()),
            store,
            rate_client: None,
        }
    }

    pub fn with_rate_client(mut self, client: ExchangeRateClient) -> Self {
        self.rate_client = Some(client);
        self
    }

    /// Wires the outbound clients named by `config` around `store`.
    pub fn from_config(config: &Config, store: Arc<dyn LedgerStore>) -> Self {
        let rate_client = config.open_exchange_app_id.as_ref().map(|app_id| {
            let client = ExchangeRateClient::new(
                config.exchange_rates_url.clone(),
                app_id.clone(),
                config.rate_lookup_timeout(),
            );
            tracing::info!(url = %config.exchange_rates_url, "Exchange rate client initialized");
            client
        });

        let rates: Arc<dyn CurrencyRateProvider> = match &rate_client {
            Some(client) => Arc::new(BaseRateProvider::new(
                config.base_currency.clone(),
                Arc::new(client.clone()),
                config.rate_lookup_timeout(),
            )),
            None => {
                tracing::warn!("OPEN_EXCHANGE_APP_ID not set, foreign currencies post at parity");
                Arc::new(BaseRateProvider::parity_only(config.base_currency.clone()))
            }
        };

        let stripe = match &config.stripe_api_key {
            Some(api_key) => {
                let client = StripeCustomerClient::new(config.stripe_api_url.clone(), api_key.clone());
                tracing::info!(url = %config.stripe_api_url, "Stripe customer client initialized");
                StripeNormalizer::new(Some(Arc::new(client)))
            }
            None => StripeNormalizer::new(None),
        };

        let state = Self::new(store, rates, Normalizer::new(stripe, AirwallexNormalizer));
        match rate_client {
            Some(client) => state.with_rate_client(client),
            None => state,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/webhooks/payment", post(handlers::webhook::payment_webhook))
        .route("/payments", get(handlers::payments::list_payments))
        .route("/payments/successful", get(handlers::payments::successful_payments))
        .route("/payments/failed", get(handlers::payments::failed_payments))
        .route("/payments/refunds", get(handlers::payments::refunded_payments))
        .route("/ledger", get(handlers::ledger::list_entries))
        .route("/ledger/balance", get(handlers::ledger::current_balance))
        .route("/ledger/payment/:payment_id", get(handlers::ledger::entries_by_payment))
        .route("/ledger/currency/:currency", get(handlers::ledger::entries_by_currency))
        .route("/ledger/entry-type/:entry_type", get(handlers::ledger::entries_by_entry_type))
        .route("/ledger/status/:status", get(handlers::ledger::entries_by_status))
        .layer(axum_middleware::from_fn(middleware::request_logger_middleware))
        .with_state(state)
}
