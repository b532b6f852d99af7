//! Ledger entry entities and the balance chain over them.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::money::round_money;
use super::payment::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Payment,
    Refund,
    Other,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Payment => "PAYMENT",
            EntryType::Refund => "REFUND",
            EntryType::Other => "OTHER",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAYMENT" => Ok(EntryType::Payment),
            "REFUND" => Ok(EntryType::Refund),
            "OTHER" => Ok(EntryType::Other),
            other => Err(UnknownVariant::new("entry type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerStatus {
    Success,
    Failed,
    Other,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Success => "SUCCESS",
            LedgerStatus::Failed => "FAILED",
            LedgerStatus::Other => "OTHER",
        }
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(LedgerStatus::Success),
            "FAILED" => Ok(LedgerStatus::Failed),
            "OTHER" => Ok(LedgerStatus::Other),
            other => Err(UnknownVariant::new("ledger status", other)),
        }
    }
}

/// An entry computed by the posting engine, not yet appended to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLedgerEntry {
    pub payment_id: Uuid,
    pub entry_type: EntryType,
    pub status: LedgerStatus,
    pub currency: String,
    pub credit: BigDecimal,
    pub debit: BigDecimal,
    pub conversion_rate: BigDecimal,
    pub credit_base: BigDecimal,
    pub debit_base: BigDecimal,
    pub balance_after_base: BigDecimal,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// An appended ledger entry. Entries are never updated or deleted.
///
/// `sequence` is the position in the append log; "most recent" always means
/// highest sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub sequence: i64,
    pub payment_id: Uuid,
    pub entry_type: EntryType,
    pub status: LedgerStatus,
    pub currency: String,
    pub credit: BigDecimal,
    pub debit: BigDecimal,
    pub conversion_rate: BigDecimal,
    pub credit_base: BigDecimal,
    pub debit_base: BigDecimal,
    pub balance_after_base: BigDecimal,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn from_new(entry: NewLedgerEntry, sequence: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            payment_id: entry.payment_id,
            entry_type: entry.entry_type,
            status: entry.status,
            currency: entry.currency,
            credit: entry.credit,
            debit: entry.debit,
            conversion_rate: entry.conversion_rate,
            credit_base: entry.credit_base,
            debit_base: entry.debit_base,
            balance_after_base: entry.balance_after_base,
            description: entry.description,
            timestamp: entry.timestamp,
            created_at: Utc::now(),
        }
    }

    /// Net effect of this entry on the running balance.
    pub fn net_base(&self) -> BigDecimal {
        &self.credit_base - &self.debit_base
    }
}

/// Filter for ledger reads. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerFilter {
    pub payment_id: Option<Uuid>,
    pub currency: Option<String>,
    pub entry_type: Option<EntryType>,
    pub status: Option<LedgerStatus>,
}

impl LedgerFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.payment_id.map_or(true, |id| entry.payment_id == id)
            && self
                .currency
                .as_deref()
                .map_or(true, |currency| entry.currency == currency)
            && self.entry_type.map_or(true, |t| entry.entry_type == t)
            && self.status.map_or(true, |s| entry.status == s)
    }
}

/// Running balances for a sequence of net movements (credit minus debit, in
/// base currency) in creation order, starting from zero.
pub fn balance_chain<I>(movements: I) -> Vec<BigDecimal>
where
    I: IntoIterator<Item = BigDecimal>,
{
    movements
        .into_iter()
        .scan(BigDecimal::zero(), |balance, net| {
            *balance = round_money(&(&*balance + net));
            Some(balance.clone())
        })
        .collect()
}

/// First entry whose stored balance disagrees with the chain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("balance chain broken at sequence {sequence}: expected {expected}, stored {stored}")]
pub struct ChainBreak {
    pub sequence: i64,
    pub expected: BigDecimal,
    pub stored: BigDecimal,
}

/// Re-derives the balance chain from `entries` (creation order) and checks it
/// against the stored `balance_after_base` of every entry.
pub fn verify_chain(entries: &[LedgerEntry]) -> Result<(), ChainBreak> {
    let expected = balance_chain(entries.iter().map(LedgerEntry::net_base));

    for (entry, expected) in entries.iter().zip(expected) {
        if entry.balance_after_base != expected {
            return Err(ChainBreak {
                sequence: entry.sequence,
                expected,
                stored: entry.balance_after_base.clone(),
            });
        }
    }

    Ok(())
}
