//! Postgres implementation of LedgerStore.
//!
//! Every unit of work is one SQL transaction that starts by taking a
//! transaction-scoped advisory lock on the ledger, so postings are strictly
//! serialized across connections and processes. Commit releases the lock;
//! dropping the unit of work rolls back.

use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    EntryType, LedgerEntry, LedgerFilter, LedgerStatus, NewLedgerEntry, Payment, PaymentStatus,
    Provider,
};
use crate::ports::{LedgerStore, LedgerUnitOfWork, RepositoryError, RepositoryResult};

/// Advisory lock key guarding the ledger's append path.
pub const LEDGER_LOCK_KEY: i64 = 0x4c45_4447_4552;

/// Postgres-backed ledger store.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_write_error(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            RepositoryError::Conflict(db.message().to_string())
        }
        _ => RepositoryError::Database(e),
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> RepositoryResult<Box<dyn LedgerUnitOfWork>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET LOCAL lock_timeout = '10s'")
            .execute(&mut *tx)
            .await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(LEDGER_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PostgresUnitOfWork { tx }))
    }

    async fn find_payment(&self, transaction_id: &str) -> RepositoryResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE transaction_id = $1")
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(PaymentRow::into_domain).transpose()
    }

    async fn list_payments(&self, status: Option<PaymentStatus>) -> RepositoryResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT * FROM payments
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PaymentRow::into_domain).collect()
    }

    async fn latest_entry(&self) -> RepositoryResult<Option<LedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerEntryRow>(
            "SELECT * FROM ledger_entries ORDER BY sequence DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(LedgerEntryRow::into_domain).transpose()
    }

    async fn list_entries(&self, filter: &LedgerFilter) -> RepositoryResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            SELECT * FROM ledger_entries
            WHERE ($1::uuid IS NULL OR payment_id = $1)
              AND ($2::text IS NULL OR currency = $2)
              AND ($3::text IS NULL OR entry_type = $3)
              AND ($4::text IS NULL OR status = $4)
            ORDER BY sequence DESC
            "#,
        )
        .bind(filter.payment_id)
        .bind(filter.currency.as_deref())
        .bind(filter.entry_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerEntryRow::into_domain).collect()
    }

    async fn entries_in_order(&self) -> RepositoryResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(
            "SELECT * FROM ledger_entries ORDER BY sequence ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerEntryRow::into_domain).collect()
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerUnitOfWork for PostgresUnitOfWork {
    async fn find_payment(&mut self, transaction_id: &str) -> RepositoryResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "SELECT * FROM payments WHERE transaction_id = $1 FOR UPDATE",
        )
        .bind(transaction_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(PaymentRow::into_domain).transpose()
    }

    async fn insert_payment(&mut self, payment: &Payment) -> RepositoryResult<Payment> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            INSERT INTO payments (
                id, transaction_id, amount, currency, status, event_timestamp,
                source, customer_email, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .bind(&payment.transaction_id)
        .bind(&payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(payment.timestamp)
        .bind(payment.source.as_str())
        .bind(&payment.customer_email)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        row.into_domain()
    }

    async fn update_payment_status(
        &mut self,
        payment_id: Uuid,
        status: PaymentStatus,
        timestamp: DateTime<Utc>,
    ) -> RepositoryResult<Payment> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            UPDATE payments
            SET status = $2, event_timestamp = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(status.as_str())
        .bind(timestamp)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(payment_id.to_string()))?
            .into_domain()
    }

    async fn latest_balance(&mut self) -> RepositoryResult<BigDecimal> {
        let balance: Option<BigDecimal> = sqlx::query_scalar(
            "SELECT balance_after_base FROM ledger_entries ORDER BY sequence DESC LIMIT 1",
        )
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(balance.unwrap_or_else(BigDecimal::zero))
    }

    async fn append_entry(&mut self, entry: &NewLedgerEntry) -> RepositoryResult<LedgerEntry> {
        let row = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            INSERT INTO ledger_entries (
                id, payment_id, entry_type, status, currency, credit, debit,
                conversion_rate, credit_base, debit_base, balance_after_base,
                description, event_timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.payment_id)
        .bind(entry.entry_type.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.currency)
        .bind(&entry.credit)
        .bind(&entry.debit)
        .bind(&entry.conversion_rate)
        .bind(&entry.credit_base)
        .bind(&entry.debit_base)
        .bind(&entry.balance_after_base)
        .bind(&entry.description)
        .bind(entry.timestamp)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        row.into_domain()
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    transaction_id: String,
    amount: BigDecimal,
    currency: String,
    status: String,
    event_timestamp: DateTime<Utc>,
    source: String,
    customer_email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> RepositoryResult<Payment> {
        Ok(Payment {
            id: self.id,
            transaction_id: self.transaction_id,
            amount: self.amount,
            currency: self.currency,
            status: self
                .status
                .parse::<PaymentStatus>()
                .map_err(|e| RepositoryError::Corrupt(e.to_string()))?,
            timestamp: self.event_timestamp,
            source: self
                .source
                .parse::<Provider>()
                .map_err(|e| RepositoryError::Corrupt(e.to_string()))?,
            customer_email: self.customer_email,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerEntryRow {
    id: Uuid,
    sequence: i64,
    payment_id: Uuid,
    entry_type: String,
    status: String,
    currency: String,
    credit: BigDecimal,
    debit: BigDecimal,
    conversion_rate: BigDecimal,
    credit_base: BigDecimal,
    debit_base: BigDecimal,
    balance_after_base: BigDecimal,
    description: String,
    event_timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl LedgerEntryRow {
    fn into_domain(self) -> RepositoryResult<LedgerEntry> {
        Ok(LedgerEntry {
            id: self.id,
            sequence: self.sequence,
            payment_id: self.payment_id,
            entry_type: self
                .entry_type
                .parse::<EntryType>()
                .map_err(|e| RepositoryError::Corrupt(e.to_string()))?,
            status: self
                .status
                .parse::<LedgerStatus>()
                .map_err(|e| RepositoryError::Corrupt(e.to_string()))?,
            currency: self.currency,
            credit: self.credit,
            debit: self.debit,
            conversion_rate: self.conversion_rate,
            credit_base: self.credit_base,
            debit_base: self.debit_base,
            balance_after_base: self.balance_after_base,
            description: self.description,
            timestamp: self.event_timestamp,
            created_at: self.created_at,
        })
    }
}
