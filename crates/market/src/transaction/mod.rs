//! Transaction aggregate: the record of a confirmed payment.

mod aggregate;
mod events;
mod state;

pub use aggregate::{PaymentRecord, Transaction};
pub use events::{TransactionCompletedData, TransactionEvent, TransactionFailedData};
pub use state::{FailureReason, PaymentMethod, TransactionStatus};

use thiserror::Error;

/// Errors that can occur when recording a transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Payment {payment_id} has already been recorded")]
    AlreadyRecorded { payment_id: String },

    /// The payment ID was already used to buy a different domain.
    #[error("Payment {payment_id} belongs to another purchase")]
    PaymentReused { payment_id: String },

    #[error("Payment confirmation carries no payment ID")]
    EmptyPaymentId,
}
