//! Payment Status Resolver
//!
//! The system has no first-class payment-status column; payment state is
//! encoded as literal annotations appended to the booking's free-text notes.
//! This module owns those literals and the pure resolution rules.

use serde::{Deserialize, Serialize};

use crate::lifecycle::LifecycleState;

/// Annotation written when a payment is confirmed.
pub const PAID_MARKER: &str = "Payment Status: paid";
/// Annotation written when a job is closed out with payment still owed.
pub const UNPAID_MARKER: &str = "Payment Status: unpaid";
/// Fragment written only when a transaction is recorded, e.g. "Method: Cash".
pub const METHOD_MARKER: &str = "Method:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive the payment status from a booking's notes and lifecycle state.
///
/// Priority order, first match wins:
/// 1. A paid marker anywhere in the notes. Append-only note writing can
///    leave both markers in one field; paid wins regardless of position.
/// 2. An unpaid marker.
/// 3. A "Method:" fragment while the wash is active or finished. The
///    fragment is only ever written alongside a recorded transaction, so it
///    counts as indirect evidence of payment once work has started.
/// 4. Default-closed: no evidence means unpaid.
pub fn resolve_payment_status(notes: Option<&str>, state: LifecycleState) -> PaymentStatus {
    let notes = notes.unwrap_or("");

    if notes.contains(PAID_MARKER) {
        return PaymentStatus::Paid;
    }
    if notes.contains(UNPAID_MARKER) {
        return PaymentStatus::Unpaid;
    }
    let method_inference_applies = matches!(
        state,
        LifecycleState::InProgress | LifecycleState::Departed | LifecycleState::Completed
    );
    if method_inference_applies && notes.contains(METHOD_MARKER) {
        return PaymentStatus::Paid;
    }

    PaymentStatus::Unpaid
}

/// The annotation fragment appended when a payment is taken.
pub fn payment_annotation(method: &str) -> String {
    format!("{} | Method: {}", PAID_MARKER, method)
}
