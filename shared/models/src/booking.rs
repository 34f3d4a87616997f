//! Booking domain models.
//!
//! A booking ties a customer and a vehicle to a single car-wash order. The
//! `notes` field is dual-purpose: human commentary and the appended payment
//! annotations the payment resolver reads (see `payment`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::lifecycle::LifecycleState;

/// A car-wash service order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: i64,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub notes: Option<String>,
    pub total_price: f64,
    pub state: LifecycleState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload; the store assigns the id and the initial state.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewBooking {
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    #[validate(length(max = 4000, message = "Notes must be at most 4000 characters"))]
    pub notes: Option<String>,
    #[validate(range(min = 0.0, message = "Total price must not be negative"))]
    pub total_price: f64,
}

impl Booking {
    /// Append a fragment to the notes, newline-separated.
    ///
    /// Notes are append-only; workflow steps add annotations without ever
    /// rewriting earlier content, so duplicate markers can accumulate.
    pub fn append_note(&mut self, fragment: &str) {
        self.notes = Some(append_fragment(self.notes.as_deref(), fragment));
        self.updated_at = Utc::now();
    }
}

/// Newline-append a fragment to an optional notes blob.
pub fn append_fragment(notes: Option<&str>, fragment: &str) -> String {
    match notes {
        Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, fragment),
        _ => fragment.to_string(),
    }
}
