use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{verify_chain, ChainBreak, EntryType, LedgerEntry, LedgerFilter, LedgerStatus};
use crate::ports::{LedgerStore, RepositoryResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    pub balance: BigDecimal,
    pub currency: String,
}

/// Read-only views over the ledger. Every listing is newest first.
#[derive(Clone)]
pub struct LedgerQueryService {
    store: Arc<dyn LedgerStore>,
    base_currency: String,
}

impl LedgerQueryService {
    pub fn new(store: Arc<dyn LedgerStore>, base_currency: impl Into<String>) -> Self {
        Self {
            store,
            base_currency: base_currency.into(),
        }
    }

    pub async fn list_all(&self) -> RepositoryResult<Vec<LedgerEntry>> {
        self.store.list_entries(&LedgerFilter::default()).await
    }

    /// Balance after the most recently appended entry, zero on an empty ledger.
    pub async fn current_balance(&self) -> RepositoryResult<Balance> {
        let balance = self
            .store
            .latest_entry()
            .await?
            .map(|entry| entry.balance_after_base)
            .unwrap_or_else(BigDecimal::zero);

        Ok(Balance {
            balance,
            currency: self.base_currency.clone(),
        })
    }

    pub async fn by_payment_id(&self, payment_id: Uuid) -> RepositoryResult<Vec<LedgerEntry>> {
        self.store
            .list_entries(&LedgerFilter {
                payment_id: Some(payment_id),
                ..Default::default()
            })
            .await
    }

    pub async fn by_currency(&self, currency: &str) -> RepositoryResult<Vec<LedgerEntry>> {
        self.store
            .list_entries(&LedgerFilter {
                currency: Some(currency.to_uppercase()),
                ..Default::default()
            })
            .await
    }

    pub async fn by_entry_type(&self, entry_type: EntryType) -> RepositoryResult<Vec<LedgerEntry>> {
        self.store
            .list_entries(&LedgerFilter {
                entry_type: Some(entry_type),
                ..Default::default()
            })
            .await
    }

    pub async fn by_status(&self, status: LedgerStatus) -> RepositoryResult<Vec<LedgerEntry>> {
        self.store
            .list_entries(&LedgerFilter {
                status: Some(status),
                ..Default::default()
            })
            .await
    }

    /// Re-derives the balance chain over the whole ledger.
    pub async fn verify(&self) -> RepositoryResult<Result<usize, ChainBreak>> {
        let entries = self.store.entries_in_order().await?;
        Ok(verify_chain(&entries).map(|_| entries.len()))
    }
}
