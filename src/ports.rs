//! Storage ports.
//!
//! [`LedgerStore`] is the durable store behind the pipeline. Writes go
//! through a [`LedgerUnitOfWork`]: a unit of work holds the ledger's single
//! writer slot from `begin()` until it is committed or dropped, so no two
//! postings interleave their prior-balance read and entry append. Dropping a
//! unit of work without committing discards all of its writes.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{LedgerEntry, LedgerFilter, NewLedgerEntry, Payment, PaymentStatus};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Starts a serialized, atomic unit of work.
    async fn begin(&self) -> RepositoryResult<Box<dyn LedgerUnitOfWork>>;

    async fn find_payment(&self, transaction_id: &str) -> RepositoryResult<Option<Payment>>;

    /// Payments, newest first.
    async fn list_payments(&self, status: Option<PaymentStatus>) -> RepositoryResult<Vec<Payment>>;

    /// The most recently appended entry.
    async fn latest_entry(&self) -> RepositoryResult<Option<LedgerEntry>>;

    /// Matching entries, newest first.
    async fn list_entries(&self, filter: &LedgerFilter) -> RepositoryResult<Vec<LedgerEntry>>;

    /// Every entry in append order, oldest first.
    async fn entries_in_order(&self) -> RepositoryResult<Vec<LedgerEntry>>;

    async fn ping(&self) -> RepositoryResult<()>;
}

#[async_trait]
pub trait LedgerUnitOfWork: Send {
    async fn find_payment(&mut self, transaction_id: &str) -> RepositoryResult<Option<Payment>>;

    async fn insert_payment(&mut self, payment: &Payment) -> RepositoryResult<Payment>;

    async fn update_payment_status(
        &mut self,
        payment_id: Uuid,
        status: PaymentStatus,
        timestamp: DateTime<Utc>,
    ) -> RepositoryResult<Payment>;

    /// Balance after the most recent entry, zero for an empty ledger.
    async fn latest_balance(&mut self) -> RepositoryResult<BigDecimal>;

    async fn append_entry(&mut self, entry: &NewLedgerEntry) -> RepositoryResult<LedgerEntry>;

    async fn commit(self: Box<Self>) -> RepositoryResult<()>;
}
