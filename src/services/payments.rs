use std::sync::Arc;

use crate::domain::{Payment, PaymentStatus};
use crate::ports::{LedgerStore, RepositoryResult};

/// Payment listings, newest first.
#[derive(Clone)]
pub struct PaymentQueryService {
    store: Arc<dyn LedgerStore>,
}

impl PaymentQueryService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn list_all(&self) -> RepositoryResult<Vec<Payment>> {
        self.store.list_payments(None).await
    }

    pub async fn by_status(&self, status: PaymentStatus) -> RepositoryResult<Vec<Payment>> {
        self.store.list_payments(Some(status)).await
    }
}
