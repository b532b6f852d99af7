use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use super::ApiResponse;
use crate::domain::{EntryType, LedgerStatus};
use crate::error::AppError;
use crate::AppState;

pub async fn list_entries(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let entries = state.ledger.list_all().await?;
    Ok(ApiResponse::ok("Ledger entries retrieved successfully", entries))
}

pub async fn current_balance(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let balance = state.ledger.current_balance().await?;
    Ok(ApiResponse::ok("Current balance retrieved successfully", balance))
}

pub async fn entries_by_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let entries = state.ledger.by_payment_id(payment_id).await?;
    Ok(ApiResponse::ok("Ledger entries retrieved successfully", entries))
}

pub async fn entries_by_currency(
    State(state): State<AppState>,
    Path(currency): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entries = state.ledger.by_currency(&currency).await?;
    Ok(ApiResponse::ok("Ledger entries retrieved successfully", entries))
}

pub async fn entries_by_entry_type(
    State(state): State<AppState>,
    Path(entry_type): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry_type: EntryType = entry_type.to_uppercase().parse()?;
    let entries = state.ledger.by_entry_type(entry_type).await?;
    Ok(ApiResponse::ok("Ledger entries retrieved successfully", entries))
}

pub async fn entries_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let status: LedgerStatus = status.to_uppercase().parse()?;
    let entries = state.ledger.by_status(status).await?;
    Ok(ApiResponse::ok("Ledger entries retrieved successfully", entries))
}
