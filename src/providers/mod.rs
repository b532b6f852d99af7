//! Provider webhook payloads and their normalization into [`PaymentEvent`].
//!
//! Each provider gets one normalizer behind [`ProviderNormalizer`]; the raw
//! event is a tagged [`ProviderEvent`] and [`Normalizer`] dispatches on the
//! tag.
//!
//! Payloads are read envelope first. The typed payment object is only parsed
//! once the event type is on the provider's allow-list, so customer, invoice
//! and other unrelated events deserialize and are acknowledged as ignored.

pub mod airwallex;
pub mod stripe;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{PaymentEvent, PaymentStatus, Provider};

pub use airwallex::{AirwallexEvent, AirwallexNormalizer};
pub use stripe::{CustomerDirectory, CustomerLookupError, StripeEvent, StripeNormalizer};

/// A raw, already-deserialized webhook event tagged with its provider.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    Stripe(StripeEvent),
    Airwallex(AirwallexEvent),
}

impl ProviderEvent {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderEvent::Stripe(_) => Provider::Stripe,
            ProviderEvent::Airwallex(_) => Provider::Airwallex,
        }
    }

    /// The provider's own event-type tag.
    pub fn event_type(&self) -> &str {
        match self {
            ProviderEvent::Stripe(e) => &e.event_type,
            ProviderEvent::Airwallex(e) => &e.name,
        }
    }
}

#[async_trait]
pub trait ProviderNormalizer: Send + Sync {
    type Event: Send + Sync;

    /// Maps a provider event to a canonical one, or `None` when the event
    /// type is not on the provider's allow-list.
    async fn normalize(&self, event: &Self::Event) -> Option<PaymentEvent>;
}

/// The `data` member of a webhook envelope. `object` stays raw until the
/// event type is known.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub object: serde_json::Value,
}

/// Looks up the canonical status for a provider event type.
pub(crate) fn lookup_status(
    table: &[(&str, PaymentStatus)],
    event_type: &str,
) -> Option<PaymentStatus> {
    table
        .iter()
        .find(|(name, _)| *name == event_type)
        .map(|(_, status)| *status)
}

/// Dispatches a [`ProviderEvent`] to the matching normalizer.
pub struct Normalizer {
    stripe: StripeNormalizer,
    airwallex: AirwallexNormalizer,
}

impl Normalizer {
    pub fn new(stripe: StripeNormalizer, airwallex: AirwallexNormalizer) -> Self {
        Self { stripe, airwallex }
    }

    pub async fn normalize(&self, event: &ProviderEvent) -> Option<PaymentEvent> {
        let normalized = match event {
            ProviderEvent::Stripe(e) => self.stripe.normalize(e).await,
            ProviderEvent::Airwallex(e) => self.airwallex.normalize(e).await,
        };

        if normalized.is_none() {
            tracing::debug!(
                provider = %event.provider(),
                event_type = event.event_type(),
                "Ignoring unsupported webhook event"
            );
        }

        normalized
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(StripeNormalizer::default(), AirwallexNormalizer)
    }
}
