use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;

use super::ApiResponse;
use crate::error::AppError;
use crate::providers::ProviderEvent;
use crate::services::ReconcileOutcome;
use crate::AppState;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
pub const AIRWALLEX_SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResult {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_entry_id: Option<Uuid>,
}

impl From<&ReconcileOutcome> for WebhookResult {
    fn from(outcome: &ReconcileOutcome) -> Self {
        let (transaction_id, ledger_entry_id) = match outcome {
            ReconcileOutcome::Ignored => (None, None),
            ReconcileOutcome::Created { payment, entry }
            | ReconcileOutcome::Updated { payment, entry } => {
                (Some(payment.transaction_id.clone()), Some(entry.id))
            }
        };

        Self {
            outcome: outcome.label(),
            transaction_id,
            ledger_entry_id,
        }
    }
}

/// Picks the provider from the signature header it sends. Header values are
/// not verified here.
pub fn parse_provider_event(headers: &HeaderMap, body: &[u8]) -> Result<ProviderEvent, AppError> {
    let malformed = |e: serde_json::Error| AppError::BadRequest(format!("Malformed webhook payload: {}", e));

    if headers.contains_key(STRIPE_SIGNATURE_HEADER) {
        serde_json::from_slice(body)
            .map(ProviderEvent::Stripe)
            .map_err(malformed)
    } else if headers.contains_key(AIRWALLEX_SIGNATURE_HEADER) {
        serde_json::from_slice(body)
            .map(ProviderEvent::Airwallex)
            .map_err(malformed)
    } else {
        Err(AppError::BadRequest("Invalid webhook type".to_string()))
    }
}

pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let event = parse_provider_event(&headers, &body)?;

    tracing::info!(
        provider = %event.provider(),
        event_type = event.event_type(),
        "Webhook received"
    );

    let outcome = state.reconciler.process(event).await?;
    let message = match outcome {
        ReconcileOutcome::Ignored => "Event ignored",
        _ => "Webhook processed successfully",
    };

    Ok(ApiResponse::ok(message, WebhookResult::from(&outcome)))
}
