//! Payment domain entities.
//! Provider-agnostic representation of a payment and the events that drive it.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Canonical payment status. Provider events outside this set never reach
/// the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PaymentSuccessful,
    PaymentFailed,
    RefundProcessed,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 3] = [
        PaymentStatus::PaymentSuccessful,
        PaymentStatus::PaymentFailed,
        PaymentStatus::RefundProcessed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::PaymentSuccessful => "payment_successful",
            PaymentStatus::PaymentFailed => "payment_failed",
            PaymentStatus::RefundProcessed => "refund_processed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("payment status", s))
    }
}

/// The provider a payment event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Stripe,
    Airwallex,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::Airwallex => "airwallex",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(Provider::Stripe),
            "airwallex" => Ok(Provider::Airwallex),
            other => Err(UnknownVariant::new("provider", other)),
        }
    }
}

/// A string that does not name any variant of a closed domain enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// A normalized webhook event, independent of the provider that sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub transaction_id: String,
    /// Major currency units, never negative.
    pub amount: BigDecimal,
    /// Uppercased currency code.
    pub currency: String,
    pub status: PaymentStatus,
    /// Event time as reported by the provider.
    pub timestamp: DateTime<Utc>,
    pub source: Provider,
    pub customer_email: Option<String>,
}

/// Persisted payment, one per transaction id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub transaction_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub timestamp: DateTime<Utc>,
    pub source: Provider,
    pub customer_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Builds the first record for a transaction id from its first event.
    pub fn from_event(event: &PaymentEvent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_id: event.transaction_id.clone(),
            amount: event.amount.clone(),
            currency: event.currency.clone(),
            status: event.status,
            timestamp: event.timestamp,
            source: event.source,
            customer_email: event.customer_email.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}
