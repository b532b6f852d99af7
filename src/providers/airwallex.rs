//! Airwallex webhook events.
//!
//! Airwallex reports amounts in major units and has no customer lookup, so
//! normalized events never carry an email.

use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{lookup_status, EventData, ProviderNormalizer};
use crate::domain::money::{currency_code, decimal_from_json};
use crate::domain::{PaymentEvent, PaymentStatus, Provider};

pub const SUPPORTED_AIRWALLEX_EVENTS: &[(&str, PaymentStatus)] = &[
    ("payment_attempt.paid", PaymentStatus::PaymentSuccessful),
    ("payment_attempt.failed_to_process", PaymentStatus::PaymentFailed),
    ("refund.settled", PaymentStatus::RefundProcessed),
];

/// Wire shape of an Airwallex event before the allow-list is consulted.
#[derive(Debug, Clone, Deserialize)]
pub struct AirwallexEnvelope {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data: EventData,
}

/// An Airwallex event. `object` is present exactly when the event name is
/// one we post to the ledger.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "AirwallexEnvelope")]
pub struct AirwallexEvent {
    pub id: String,
    pub name: String,
    pub object: Option<AirwallexObject>,
}

impl TryFrom<AirwallexEnvelope> for AirwallexEvent {
    type Error = String;

    fn try_from(envelope: AirwallexEnvelope) -> Result<Self, Self::Error> {
        let object = match lookup_status(SUPPORTED_AIRWALLEX_EVENTS, &envelope.name) {
            Some(_) => Some(
                AirwallexObject::deserialize(envelope.data.object)
                    .map_err(|e| format!("invalid {} object: {}", envelope.name, e))?,
            ),
            None => None,
        };

        Ok(Self {
            id: envelope.id,
            name: envelope.name,
            object,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirwallexObject {
    pub id: String,
    pub amount: serde_json::Number,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AirwallexNormalizer;

impl AirwallexNormalizer {
    fn amount(object: &AirwallexObject) -> Option<BigDecimal> {
        let amount = decimal_from_json(&object.amount)?;
        if amount < BigDecimal::zero() {
            return None;
        }
        Some(amount)
    }
}

#[async_trait]
impl ProviderNormalizer for AirwallexNormalizer {
    type Event = AirwallexEvent;

    async fn normalize(&self, event: &AirwallexEvent) -> Option<PaymentEvent> {
        let status = lookup_status(SUPPORTED_AIRWALLEX_EVENTS, &event.name)?;
        let object = event.object.as_ref()?;

        let Some(amount) = Self::amount(object) else {
            tracing::warn!(
                event_id = %event.id,
                amount = %object.amount,
                "Airwallex event has an invalid amount"
            );
            return None;
        };

        let Some(currency) = currency_code(&object.currency) else {
            tracing::warn!(
                event_id = %event.id,
                currency = %object.currency,
                "Airwallex event has an invalid currency code"
            );
            return None;
        };

        Some(PaymentEvent {
            transaction_id: object
                .payment_intent_id
                .clone()
                .unwrap_or_else(|| object.id.clone()),
            amount,
            currency,
            status,
            timestamp: object.created_at,
            source: Provider::Airwallex,
            customer_email: None,
        })
    }
}
