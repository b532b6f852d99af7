//! Ledger posting engine.
//!
//! Turns a payment event into a ledger entry given the conversion rate to
//! the base currency and the balance of the most recent entry. Everything
//! here is pure; fetching the rate and the prior balance, and serializing
//! postings, is the caller's job.

use bigdecimal::{BigDecimal, Zero};
use uuid::Uuid;

use super::ledger::{EntryType, LedgerStatus, NewLedgerEntry};
use super::money::round_money;
use super::payment::{PaymentEvent, PaymentStatus};

pub fn entry_type_for(status: PaymentStatus) -> EntryType {
    match status {
        PaymentStatus::PaymentSuccessful | PaymentStatus::PaymentFailed => EntryType::Payment,
        PaymentStatus::RefundProcessed => EntryType::Refund,
    }
}

pub fn ledger_status_for(status: PaymentStatus) -> LedgerStatus {
    match status {
        PaymentStatus::PaymentSuccessful | PaymentStatus::RefundProcessed => LedgerStatus::Success,
        PaymentStatus::PaymentFailed => LedgerStatus::Failed,
    }
}

/// Credit side of an entry. Refunds and failures never credit.
pub fn credit_for(entry_type: EntryType, status: LedgerStatus, amount: &BigDecimal) -> BigDecimal {
    if entry_type == EntryType::Refund || status == LedgerStatus::Failed {
        return BigDecimal::zero();
    }
    amount.clone()
}

/// Debit side of an entry. Payments and failures never debit.
pub fn debit_for(entry_type: EntryType, status: LedgerStatus, amount: &BigDecimal) -> BigDecimal {
    if entry_type == EntryType::Payment || status == LedgerStatus::Failed {
        return BigDecimal::zero();
    }
    amount.clone()
}

pub fn describe(
    entry_type: EntryType,
    status: LedgerStatus,
    source: &str,
    transaction_id: &str,
) -> String {
    match (entry_type, status) {
        (EntryType::Payment, LedgerStatus::Success) => format!("Payment from {}", source),
        (EntryType::Payment, _) => format!("Failed payment from {}", source),
        _ => format!("Refund for transaction {}", transaction_id),
    }
}

/// Computes the entry for `event` on top of `prior_balance`.
///
/// `conversion_rate` is captured on the entry as-is; base amounts and the new
/// balance are rounded to 3 places.
pub fn post_entry(
    payment_id: Uuid,
    event: &PaymentEvent,
    conversion_rate: &BigDecimal,
    prior_balance: &BigDecimal,
) -> NewLedgerEntry {
    let entry_type = entry_type_for(event.status);
    let status = ledger_status_for(event.status);

    let credit = credit_for(entry_type, status, &event.amount);
    let debit = debit_for(entry_type, status, &event.amount);

    let credit_base = round_money(&(&credit * conversion_rate));
    let debit_base = round_money(&(&debit * conversion_rate));
    let balance_after_base = round_money(&(prior_balance + &credit_base - &debit_base));

    NewLedgerEntry {
        payment_id,
        entry_type,
        status,
        currency: event.currency.clone(),
        credit,
        debit,
        conversion_rate: conversion_rate.clone(),
        credit_base,
        debit_base,
        balance_after_base,
        description: describe(
            entry_type,
            status,
            event.source.as_str(),
            &event.transaction_id,
        ),
        timestamp: event.timestamp,
    }
}
