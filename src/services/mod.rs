pub mod ledger;
pub mod payments;
pub mod reconciliation;

pub use ledger::{Balance, LedgerQueryService};
pub use payments::PaymentQueryService;
pub use reconciliation::{PaymentReconciler, ReconcileError, ReconcileOutcome};
