use std::sync::Arc;

use thiserror::Error;

use crate::domain::{decide, post_entry, Decision, LedgerEntry, Payment, PaymentEvent, PaymentStatus};
use crate::fx::CurrencyRateProvider;
use crate::ports::{LedgerStore, RepositoryError};
use crate::providers::{Normalizer, ProviderEvent};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Duplicate event: transaction {transaction_id} is already {status}")]
    Duplicate {
        transaction_id: String,
        status: PaymentStatus,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The event type is outside the provider's allow-list.
    Ignored,
    Created { payment: Payment, entry: LedgerEntry },
    Updated { payment: Payment, entry: LedgerEntry },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Ignored => "ignored",
            ReconcileOutcome::Created { .. } => "created",
            ReconcileOutcome::Updated { .. } => "updated",
        }
    }
}

/// Drives a provider event through normalization, the create/update/duplicate
/// decision and ledger posting.
#[derive(Clone)]
pub struct PaymentReconciler {
    normalizer: Arc<Normalizer>,
    rates: Arc<dyn CurrencyRateProvider>,
    store: Arc<dyn LedgerStore>,
}

impl PaymentReconciler {
    pub fn new(
        normalizer: Arc<Normalizer>,
        rates: Arc<dyn CurrencyRateProvider>,
        store: Arc<dyn LedgerStore>,
    ) -> Self {
        Self {
            normalizer,
            rates,
            store,
        }
    }

    pub async fn process(&self, event: ProviderEvent) -> Result<ReconcileOutcome, ReconcileError> {
        match self.normalizer.normalize(&event).await {
            Some(normalized) => self.apply(normalized).await,
            None => Ok(ReconcileOutcome::Ignored),
        }
    }

    /// Applies an already-normalized event.
    ///
    /// The payment write and its ledger entry commit together or not at all.
    pub async fn apply(&self, event: PaymentEvent) -> Result<ReconcileOutcome, ReconcileError> {
        // Cheap rejection of redeliveries before paying for a rate lookup.
        // The decision made under the unit of work below is authoritative.
        if let Some(existing) = self.store.find_payment(&event.transaction_id).await? {
            if decide(Some(&existing), &event) == Decision::Duplicate {
                return Err(self.duplicate(&event));
            }
        }

        let conversion_rate = self.rates.rate_to_base(&event.currency).await;

        let mut uow = self.store.begin().await?;
        let existing = uow.find_payment(&event.transaction_id).await?;

        let (payment, created) = match decide(existing.as_ref(), &event) {
            Decision::Duplicate => return Err(self.duplicate(&event)),
            Decision::Create => (uow.insert_payment(&Payment::from_event(&event)).await?, true),
            Decision::Update {
                payment_id,
                previous_status,
            } => {
                tracing::info!(
                    transaction_id = %event.transaction_id,
                    from = %previous_status,
                    to = %event.status,
                    "Payment status transition"
                );
                let payment = uow
                    .update_payment_status(payment_id, event.status, event.timestamp)
                    .await?;
                (payment, false)
            }
        };

        let prior_balance = uow.latest_balance().await?;
        let new_entry = post_entry(payment.id, &event, &conversion_rate, &prior_balance);
        let entry = uow.append_entry(&new_entry).await?;
        uow.commit().await?;

        tracing::info!(
            transaction_id = %payment.transaction_id,
            payment_id = %payment.id,
            status = %payment.status,
            currency = %entry.currency,
            sequence = entry.sequence,
            balance_after_base = %entry.balance_after_base,
            "Ledger entry posted"
        );

        Ok(if created {
            ReconcileOutcome::Created { payment, entry }
        } else {
            ReconcileOutcome::Updated { payment, entry }
        })
    }

    fn duplicate(&self, event: &PaymentEvent) -> ReconcileError {
        tracing::warn!(
            transaction_id = %event.transaction_id,
            status = %event.status,
            provider = %event.source,
            "Rejecting duplicate payment event"
        );
        ReconcileError::Duplicate {
            transaction_id: event.transaction_id.clone(),
            status: event.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLedgerStore;
    use crate::domain::{verify_chain, EntryType, LedgerFilter, LedgerStatus, Provider};
    use crate::fx::BaseRateProvider;
    use crate::ports::{LedgerUnitOfWork, RepositoryResult};
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn event(txid: &str, amount: &str, currency: &str, status: PaymentStatus) -> PaymentEvent {
        PaymentEvent {
            transaction_id: txid.to_string(),
            amount: dec(amount),
            currency: currency.to_string(),
            status,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            source: Provider::Stripe,
            customer_email: None,
        }
    }

    fn reconciler(store: Arc<dyn LedgerStore>) -> PaymentReconciler {
        PaymentReconciler::new(
            Arc::new(Normalizer::default()),
            Arc::new(BaseRateProvider::parity_only("USD")),
            store,
        )
    }

    #[tokio::test]
    async fn test_first_event_creates_payment_and_entry() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let reconciler = reconciler(store.clone());

        let outcome = reconciler
            .apply(event("pi_1", "100.00", "USD", PaymentStatus::PaymentSuccessful))
            .await
            .unwrap();

        let ReconcileOutcome::Created { payment, entry } = outcome else {
            panic!("expected a created outcome");
        };
        assert_eq!(payment.status, PaymentStatus::PaymentSuccessful);
        assert_eq!(entry.payment_id, payment.id);
        assert_eq!(entry.entry_type, EntryType::Payment);
        assert_eq!(entry.status, LedgerStatus::Success);
        assert_eq!(entry.balance_after_base, dec("100.000"));
        assert_eq!(entry.description, "Payment from stripe");
    }

    #[tokio::test]
    async fn test_same_status_twice_is_rejected_without_side_effects() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let reconciler = reconciler(store.clone());
        let e = event("pi_1", "100.00", "USD", PaymentStatus::PaymentSuccessful);

        reconciler.apply(e.clone()).await.unwrap();
        let err = reconciler.apply(e).await.unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Duplicate { ref transaction_id, status: PaymentStatus::PaymentSuccessful }
                if transaction_id == "pi_1"
        ));
        assert_eq!(store.list_payments(None).await.unwrap().len(), 1);
        assert_eq!(store.entries_in_order().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_status_change_updates_payment_and_chains_entry() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let reconciler = reconciler(store.clone());

        reconciler
            .apply(event("pi_1", "100.00", "USD", PaymentStatus::PaymentSuccessful))
            .await
            .unwrap();
        let outcome = reconciler
            .apply(event("pi_1", "100.00", "USD", PaymentStatus::RefundProcessed))
            .await
            .unwrap();

        let ReconcileOutcome::Updated { payment, entry } = outcome else {
            panic!("expected an updated outcome");
        };
        assert_eq!(payment.status, PaymentStatus::RefundProcessed);
        assert_eq!(entry.entry_type, EntryType::Refund);
        assert_eq!(entry.debit_base, dec("100.000"));
        assert_eq!(entry.balance_after_base, dec("0.000"));
        assert_eq!(entry.description, "Refund for transaction pi_1");

        let payments = store.list_payments(None).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::RefundProcessed);

        let entries = store.entries_in_order().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(verify_chain(&entries).is_ok());
    }

    #[tokio::test]
    async fn test_failed_payment_posts_zero_effect_entry() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let reconciler = reconciler(store.clone());

        reconciler
            .apply(event("pi_1", "40.00", "USD", PaymentStatus::PaymentSuccessful))
            .await
            .unwrap();
        reconciler
            .apply(event("pi_2", "25.00", "USD", PaymentStatus::PaymentFailed))
            .await
            .unwrap();

        let latest = store.latest_entry().await.unwrap().unwrap();
        assert_eq!(latest.status, LedgerStatus::Failed);
        assert_eq!(latest.credit_base, dec("0"));
        assert_eq!(latest.debit_base, dec("0"));
        assert_eq!(latest.balance_after_base, dec("40.000"));
        assert_eq!(latest.description, "Failed payment from stripe");
    }

    /// Delegates to an in-memory store but fails every entry append.
    struct FailingAppendStore {
        inner: InMemoryLedgerStore,
    }

    struct FailingAppendUnitOfWork {
        inner: Box<dyn LedgerUnitOfWork>,
    }

    #[async_trait]
    impl LedgerStore for FailingAppendStore {
        async fn begin(&self) -> RepositoryResult<Box<dyn LedgerUnitOfWork>> {
            Ok(Box::new(FailingAppendUnitOfWork {
                inner: self.inner.begin().await?,
            }))
        }

        async fn find_payment(&self, transaction_id: &str) -> RepositoryResult<Option<Payment>> {
            self.inner.find_payment(transaction_id).await
        }

        async fn list_payments(&self, status: Option<PaymentStatus>) -> RepositoryResult<Vec<Payment>> {
            self.inner.list_payments(status).await
        }

        async fn latest_entry(&self) -> RepositoryResult<Option<LedgerEntry>> {
            self.inner.latest_entry().await
        }

        async fn list_entries(&self, filter: &LedgerFilter) -> RepositoryResult<Vec<LedgerEntry>> {
            self.inner.list_entries(filter).await
        }

        async fn entries_in_order(&self) -> RepositoryResult<Vec<LedgerEntry>> {
            self.inner.entries_in_order().await
        }

        async fn ping(&self) -> RepositoryResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl LedgerUnitOfWork for FailingAppendUnitOfWork {
        async fn find_payment(&mut self, transaction_id: &str) -> RepositoryResult<Option<Payment>> {
            self.inner.find_payment(transaction_id).await
        }

        async fn insert_payment(&mut self, payment: &Payment) -> RepositoryResult<Payment> {
            self.inner.insert_payment(payment).await
        }

        async fn update_payment_status(
            &mut self,
            payment_id: uuid::Uuid,
            status: PaymentStatus,
            timestamp: chrono::DateTime<Utc>,
        ) -> RepositoryResult<Payment> {
            self.inner
                .update_payment_status(payment_id, status, timestamp)
                .await
        }

        async fn latest_balance(&mut self) -> RepositoryResult<BigDecimal> {
            self.inner.latest_balance().await
        }

        async fn append_entry(
            &mut self,
            _entry: &crate::domain::NewLedgerEntry,
        ) -> RepositoryResult<LedgerEntry> {
            Err(RepositoryError::Conflict("ledger unavailable".to_string()))
        }

        async fn commit(self: Box<Self>) -> RepositoryResult<()> {
            self.inner.commit().await
        }
    }

    #[tokio::test]
    async fn test_failed_posting_leaves_no_payment_behind() {
        let store = Arc::new(FailingAppendStore {
            inner: InMemoryLedgerStore::new(),
        });
        let reconciler = reconciler(store.clone());

        let err = reconciler
            .apply(event("pi_1", "10.00", "USD", PaymentStatus::PaymentSuccessful))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Repository(_)));
        assert!(store.find_payment("pi_1").await.unwrap().is_none());
        assert!(store.entries_in_order().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_keep_the_balance_chain_intact() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let reconciler = reconciler(store.clone());

        let mut handles = Vec::new();
        for i in 0..20 {
            let reconciler = reconciler.clone();
            handles.push(tokio::spawn(async move {
                reconciler
                    .apply(event(&format!("pi_{i}"), "1.50", "USD", PaymentStatus::PaymentSuccessful))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let entries = store.entries_in_order().await.unwrap();
        assert_eq!(entries.len(), 20);
        assert!(verify_chain(&entries).is_ok());
        assert_eq!(entries.last().unwrap().balance_after_base, dec("30.000"));
    }

    #[tokio::test]
    async fn test_racing_first_deliveries_create_one_payment() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let reconciler = reconciler(store.clone());
        let e = event("pi_race", "5.00", "USD", PaymentStatus::PaymentSuccessful);

        let (a, b) = tokio::join!(reconciler.apply(e.clone()), reconciler.apply(e));

        let created = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Ok(ReconcileOutcome::Created { .. })))
            .count();
        let duplicates = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(ReconcileError::Duplicate { .. })))
            .count();
        assert_eq!(created, 1);
        assert_eq!(duplicates, 1);
        assert_eq!(store.entries_in_order().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_provider_event_is_ignored() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let reconciler = reconciler(store.clone());

        let raw: crate::providers::StripeEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": "customer.created",
            "created": 1_700_000_000,
            "data": { "object": { "id": "cus_1", "object": "customer", "email": "a@b.c" } }
        }))
        .unwrap();

        let outcome = reconciler.process(ProviderEvent::Stripe(raw)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Ignored);
        assert!(store.entries_in_order().await.unwrap().is_empty());
    }
}
