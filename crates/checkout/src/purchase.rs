//! Purchase saga constants.

/// Step name: charge the buyer through the payment widget.
pub const STEP_CAPTURE_PAYMENT: &str = "capture_payment";

/// Step name: record the captured payment as the domain's sale.
pub const STEP_COMMIT_SALE: &str = "commit_sale";

/// Compensation step: hand a captured payment to operators for refund.
pub const STEP_FLAG_REFUND: &str = "flag_refund";
