//! Checkout: the purchase saga.
//!
//! A checkout takes a buyer from paying for a domain to owning it:
//! 1. Capture the payment through a [`PaymentWidget`]
//! 2. Commit the sale (transaction and domain written atomically)
//!
//! If the sale cannot be committed once money has been captured, the
//! payment is flagged for manual refund. Every checkout is event-sourced
//! and can be inspected by ID.

pub mod aggregate;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod payment;
pub mod purchase;
pub mod state;

pub use aggregate::{Checkout, FlaggedRefund};
pub use coordinator::{CheckoutCoordinator, CheckoutOutcome, DEFAULT_PAYMENT_TIMEOUT, StartCheckout};
pub use error::CheckoutError;
pub use events::{CheckoutEvent, RefundFlaggedData};
pub use payment::{
    Currency, InMemoryPaymentWidget, PayPalConfig, PayPalWidget, PaymentOrder, PaymentWidget,
};
pub use state::CheckoutState;
