//! Framework-agnostic payment and ledger model.

pub mod ledger;
pub mod money;
pub mod payment;
pub mod posting;
pub mod reconcile;

pub use ledger::{
    balance_chain, verify_chain, ChainBreak, EntryType, LedgerEntry, LedgerFilter, LedgerStatus,
    NewLedgerEntry,
};
pub use payment::{Payment, PaymentEvent, PaymentStatus, Provider, UnknownVariant};
pub use posting::post_entry;
pub use reconcile::{decide, Decision};
