//! In-memory implementation of LedgerStore.
//!
//! A single tokio mutex guards the whole store. A unit of work owns the
//! guard for its lifetime and writes to a staged copy that replaces the
//! shared state on commit.

use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{LedgerEntry, LedgerFilter, NewLedgerEntry, Payment, PaymentStatus};
use crate::ports::{LedgerStore, LedgerUnitOfWork, RepositoryError, RepositoryResult};

#[derive(Debug, Clone, Default)]
struct State {
    payments: Vec<Payment>,
    entries: Vec<LedgerEntry>,
    last_sequence: i64,
}

impl State {
    fn payment_by_transaction(&self, transaction_id: &str) -> Option<&Payment> {
        self.payments
            .iter()
            .find(|p| p.transaction_id == transaction_id)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> RepositoryResult<Box<dyn LedgerUnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, staged }))
    }

    async fn find_payment(&self, transaction_id: &str) -> RepositoryResult<Option<Payment>> {
        let state = self.state.lock().await;
        Ok(state.payment_by_transaction(transaction_id).cloned())
    }

    async fn list_payments(&self, status: Option<PaymentStatus>) -> RepositoryResult<Vec<Payment>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .rev()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect())
    }

    async fn latest_entry(&self) -> RepositoryResult<Option<LedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state.entries.last().cloned())
    }

    async fn list_entries(&self, filter: &LedgerFilter) -> RepositoryResult<Vec<LedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn entries_in_order(&self) -> RepositoryResult<Vec<LedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state.entries.clone())
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

#[async_trait]
impl LedgerUnitOfWork for InMemoryUnitOfWork {
    async fn find_payment(&mut self, transaction_id: &str) -> RepositoryResult<Option<Payment>> {
        Ok(self.staged.payment_by_transaction(transaction_id).cloned())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> RepositoryResult<Payment> {
        if self
            .staged
            .payment_by_transaction(&payment.transaction_id)
            .is_some()
        {
            return Err(RepositoryError::Conflict(format!(
                "payment for transaction {} already exists",
                payment.transaction_id
            )));
        }
        self.staged.payments.push(payment.clone());
        Ok(payment.clone())
    }

    async fn update_payment_status(
        &mut self,
        payment_id: Uuid,
        status: PaymentStatus,
        timestamp: DateTime<Utc>,
    ) -> RepositoryResult<Payment> {
        let payment = self
            .staged
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| RepositoryError::NotFound(payment_id.to_string()))?;

        payment.status = status;
        payment.timestamp = timestamp;
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn latest_balance(&mut self) -> RepositoryResult<BigDecimal> {
        Ok(self
            .staged
            .entries
            .last()
            .map(|e| e.balance_after_base.clone())
            .unwrap_or_else(BigDecimal::zero))
    }

    async fn append_entry(&mut self, entry: &NewLedgerEntry) -> RepositoryResult<LedgerEntry> {
        if !self.staged.payments.iter().any(|p| p.id == entry.payment_id) {
            return Err(RepositoryError::Conflict(format!(
                "ledger entry references unknown payment {}",
                entry.payment_id
            )));
        }
        self.staged.last_sequence += 1;
        let appended = LedgerEntry::from_new(entry.clone(), self.staged.last_sequence);
        self.staged.entries.push(appended.clone());
        Ok(appended)
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        let InMemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
