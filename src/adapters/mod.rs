pub mod in_memory_ledger_store;
pub mod postgres_ledger_store;

pub use in_memory_ledger_store::InMemoryLedgerStore;
pub use postgres_ledger_store::PostgresLedgerStore;
