//! # WashPoint Core Domain Models
//!
//! Domain models for the WashPoint car-wash point-of-sale core.
//!
//! ## Key Models
//!
//! - **Booking**: a single service order tying a customer and vehicle to a
//!   lifecycle state, price, and free-text notes
//! - **LifecycleState / BookingAction**: the booking state machine and its
//!   transition table
//! - **PaymentStatus**: the binary status derived from note annotations by
//!   the payment resolver
//! - **StateTransition**: append-only, hash-chained transition history
//!
//! The transition table and the payment resolver are pure; persistence and
//! orchestration live in the store and service crates.

pub mod booking;
pub mod history;
pub mod lifecycle;
pub mod payment;


pub use booking::{append_fragment, Booking, NewBooking};
pub use history::{verify_chain, ChainVerification, StateTransition};
pub use lifecycle::{BookingAction, LifecycleState};
pub use payment::{
    payment_annotation, resolve_payment_status, PaymentStatus, METHOD_MARKER, PAID_MARKER,
    UNPAID_MARKER,
};
