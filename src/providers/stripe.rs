//! Stripe webhook events.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::{lookup_status, EventData, ProviderNormalizer};
use crate::domain::money::{currency_code, from_minor_units};
use crate::domain::{PaymentEvent, PaymentStatus, Provider};

/// Stripe event types we post to the ledger.
pub const SUPPORTED_STRIPE_EVENTS: &[(&str, PaymentStatus)] = &[
    ("payment_intent.succeeded", PaymentStatus::PaymentSuccessful),
    ("payment_intent.payment_failed", PaymentStatus::PaymentFailed),
    ("charge.refunded", PaymentStatus::RefundProcessed),
];

/// Wire shape of a Stripe event before the allow-list is consulted.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEnvelope {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub data: EventData,
}

/// A Stripe event. `object` is present exactly when the event type is one
/// we post to the ledger.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "StripeEnvelope")]
pub struct StripeEvent {
    pub id: String,
    pub event_type: String,
    /// Unix seconds.
    pub created: Option<i64>,
    pub object: Option<StripeObject>,
}

impl TryFrom<StripeEnvelope> for StripeEvent {
    type Error = String;

    fn try_from(envelope: StripeEnvelope) -> Result<Self, Self::Error> {
        let object = match lookup_status(SUPPORTED_STRIPE_EVENTS, &envelope.event_type) {
            Some(_) => Some(
                StripeObject::deserialize(envelope.data.object)
                    .map_err(|e| format!("invalid {} object: {}", envelope.event_type, e))?,
            ),
            None => None,
        };

        Ok(Self {
            id: envelope.id,
            event_type: envelope.event_type,
            created: envelope.created,
            object,
        })
    }
}

/// The payment intent or charge carried by the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeObject {
    pub id: String,
    /// Minor units.
    pub amount: u64,
    pub currency: String,
    pub created: Option<i64>,
    pub payment_intent: Option<String>,
    pub customer: Option<String>,
}

#[derive(Error, Debug)]
pub enum CustomerLookupError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Customer not found: {0}")]
    NotFound(String),
    #[error("Unexpected response status: {0}")]
    Status(u16),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

/// Resolves a provider customer id to an email address.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// `Ok(None)` when the customer exists but has no usable email (or was
    /// deleted).
    async fn customer_email(&self, customer_id: &str) -> Result<Option<String>, CustomerLookupError>;
}

#[derive(Clone, Default)]
pub struct StripeNormalizer {
    customers: Option<Arc<dyn CustomerDirectory>>,
}

impl StripeNormalizer {
    pub fn new(customers: Option<Arc<dyn CustomerDirectory>>) -> Self {
        Self { customers }
    }

    fn transaction_id(object: &StripeObject) -> String {
        object
            .payment_intent
            .clone()
            .unwrap_or_else(|| object.id.clone())
    }

    async fn customer_email(&self, object: &StripeObject) -> Option<String> {
        let customer_id = object.customer.as_deref()?;
        let customers = self.customers.as_ref()?;

        match customers.customer_email(customer_id).await {
            Ok(email) => email,
            Err(e) => {
                tracing::error!(customer_id, "Failed to retrieve customer: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl ProviderNormalizer for StripeNormalizer {
    type Event = StripeEvent;

    async fn normalize(&self, event: &StripeEvent) -> Option<PaymentEvent> {
        let status = lookup_status(SUPPORTED_STRIPE_EVENTS, &event.event_type)?;
        let object = event.object.as_ref()?;

        let created = event.created.or(object.created);
        let Some(timestamp) = created.and_then(|secs| Utc.timestamp_opt(secs, 0).single()) else {
            tracing::warn!(
                event_id = %event.id,
                created = ?created,
                "Stripe event has a missing or out-of-range timestamp"
            );
            return None;
        };

        let Some(currency) = currency_code(&object.currency) else {
            tracing::warn!(
                event_id = %event.id,
                currency = %object.currency,
                "Stripe event has an invalid currency code"
            );
            return None;
        };

        Some(PaymentEvent {
            transaction_id: Self::transaction_id(object),
            amount: from_minor_units(object.amount),
            currency,
            status,
            timestamp,
            source: Provider::Stripe,
            customer_email: self.customer_email(object).await,
        })
    }
}
