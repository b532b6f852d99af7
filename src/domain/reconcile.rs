//! Create/update/reject decision for an incoming event.

use uuid::Uuid;

use super::payment::{Payment, PaymentEvent, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No payment exists for the transaction id yet.
    Create,
    /// The payment exists with a different status.
    Update {
        payment_id: Uuid,
        previous_status: PaymentStatus,
    },
    /// The payment already carries this status: a redelivery.
    Duplicate,
}

pub fn decide(existing: Option<&Payment>, event: &PaymentEvent) -> Decision {
    match existing {
        None => Decision::Create,
        Some(payment) if payment.status == event.status => Decision::Duplicate,
        Some(payment) => Decision::Update {
            payment_id: payment.id,
            previous_status: payment.status,
        },
    }
}
