//! In-memory record store.
//!
//! Backs tests and single-node deployments; also the substitutable fake the
//! lifecycle service is exercised against. Mutations take the write lock for
//! the whole read-check-write section, so the expected-state precondition
//! holds under concurrent callers just as the Postgres row lock does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use washpoint_models::{append_fragment, Booking, LifecycleState, NewBooking, StateTransition};
use washpoint_utils::{WashpointError, WashpointResult};

use crate::record_store::{RecordStore, StateUpdate};

pub struct MemoryRecordStore {
    bookings: Arc<RwLock<HashMap<i64, Booking>>>,
    transitions: Arc<RwLock<Vec<StateTransition>>>,
    next_id: AtomicI64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            bookings: Arc::new(RwLock::new(HashMap::new())),
            transitions: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn latest_hash(transitions: &[StateTransition], booking_id: i64) -> Option<String> {
    transitions
        .iter()
        .rev()
        .find(|t| t.booking_id == booking_id)
        .map(|t| t.hash.clone())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_booking(&self, new: NewBooking) -> WashpointResult<Booking> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();

        let booking = Booking {
            id,
            customer_id: new.customer_id,
            vehicle_id: new.vehicle_id,
            notes: new.notes,
            total_price: new.total_price,
            state: LifecycleState::Draft,
            created_at: now,
            updated_at: now,
        };

        let mut bookings = self.bookings.write().await;
        let mut transitions = self.transitions.write().await;
        bookings.insert(id, booking.clone());
        transitions.push(StateTransition::new(id, None, LifecycleState::Draft, None));

        Ok(booking)
    }

    async fn fetch_booking(&self, id: i64) -> WashpointResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn list_bookings(&self) -> WashpointResult<Vec<Booking>> {
        let mut all: Vec<Booking> = self.bookings.read().await.values().cloned().collect();
        all.sort_by_key(|b| std::cmp::Reverse(b.created_at));
        Ok(all)
    }

    async fn update_state(
        &self,
        id: i64,
        expected: Option<LifecycleState>,
        next: LifecycleState,
    ) -> WashpointResult<StateUpdate> {
        let mut bookings = self.bookings.write().await;
        let mut transitions = self.transitions.write().await;

        let Some(booking) = bookings.get_mut(&id) else {
            return Ok(StateUpdate::Missing);
        };

        let actual = booking.state;
        if let Some(expected) = expected {
            if actual != expected {
                return Ok(StateUpdate::Conflict { actual });
            }
        }

        booking.state = next;
        booking.updated_at = Utc::now();

        let previous_hash = latest_hash(&transitions, id);
        transitions.push(StateTransition::new(id, Some(actual), next, previous_hash));

        Ok(StateUpdate::Applied(booking.clone()))
    }

    async fn append_notes(&self, id: i64, fragment: &str) -> WashpointResult<Booking> {
        let mut bookings = self.bookings.write().await;

        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| WashpointError::not_found(format!("booking {id}")))?;

        booking.notes = Some(append_fragment(booking.notes.as_deref(), fragment));
        booking.updated_at = Utc::now();

        Ok(booking.clone())
    }

    async fn transitions(
        &self,
        booking_id: i64,
        limit: Option<i64>,
    ) -> WashpointResult<Vec<StateTransition>> {
        let transitions = self.transitions.read().await;

        let mut records: Vec<StateTransition> = transitions
            .iter()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect();
        // Insertion order is chronological; newest first for callers
        records.reverse();

        if let Some(limit) = limit {
            records.truncate(limit.max(0) as usize);
        }

        Ok(records)
    }
}
