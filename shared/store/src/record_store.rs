//! The persistence contract the lifecycle service is built against.

use async_trait::async_trait;

use washpoint_models::{Booking, LifecycleState, NewBooking, StateTransition};
use washpoint_utils::WashpointResult;

/// Outcome of a (possibly conditional) state write.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    /// The write applied; the booking as stored afterwards.
    Applied(Booking),
    /// No booking with that id exists.
    Missing,
    /// The precondition failed: another writer got there first.
    Conflict { actual: LifecycleState },
}

/// Typed CRUD over the bookings and booking-state-transitions collections.
///
/// Implementations must make `insert_booking` and `update_state` atomic over
/// the booking row and its transition record: both commit or neither does.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a booking in `draft` together with its initializing
    /// transition record.
    async fn insert_booking(&self, new: NewBooking) -> WashpointResult<Booking>;

    async fn fetch_booking(&self, id: i64) -> WashpointResult<Option<Booking>>;

    async fn list_bookings(&self) -> WashpointResult<Vec<Booking>>;

    /// Write a new state and append the matching transition record.
    ///
    /// When `expected` is given the write only applies while the stored
    /// state still equals it; a lost race comes back as
    /// [`StateUpdate::Conflict`] instead of silently overwriting. Passing
    /// `None` writes unconditionally (used to re-initialize a booking).
    async fn update_state(
        &self,
        id: i64,
        expected: Option<LifecycleState>,
        next: LifecycleState,
    ) -> WashpointResult<StateUpdate>;

    /// Newline-append a fragment to the booking's notes.
    async fn append_notes(&self, id: i64, fragment: &str) -> WashpointResult<Booking>;

    /// Transition records for a booking, newest first.
    async fn transitions(
        &self,
        booking_id: i64,
        limit: Option<i64>,
    ) -> WashpointResult<Vec<StateTransition>>;
}
