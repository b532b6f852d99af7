use axum::{extract::State, response::IntoResponse};

use super::ApiResponse;
use crate::domain::PaymentStatus;
use crate::error::AppError;
use crate::AppState;

pub async fn list_payments(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let payments = state.payments.list_all().await?;
    Ok(ApiResponse::ok("Payments retrieved successfully", payments))
}

pub async fn successful_payments(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let payments = state.payments.by_status(PaymentStatus::PaymentSuccessful).await?;
    Ok(ApiResponse::ok("Successful payments retrieved successfully", payments))
}

pub async fn failed_payments(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let payments = state.payments.by_status(PaymentStatus::PaymentFailed).await?;
    Ok(ApiResponse::ok("Failed payments retrieved successfully", payments))
}

pub async fn refunded_payments(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let payments = state.payments.by_status(PaymentStatus::RefundProcessed).await?;
    Ok(ApiResponse::ok("Refunds retrieved successfully", payments))
}
