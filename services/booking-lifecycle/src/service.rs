//! Booking Lifecycle Service
//!
//! The orchestration-facing core: state transitions against the record
//! store, payment-status checks, and the finish workflow that offers the
//! operator a choice instead of blocking on unpaid jobs.

use std::sync::Arc;

use validator::Validate;

use washpoint_models::{
    payment_annotation, resolve_payment_status, Booking, BookingAction, ChainVerification,
    LifecycleState, NewBooking, PaymentStatus, StateTransition, UNPAID_MARKER,
};
use washpoint_store::{RecordStore, StateUpdate};
use washpoint_utils::{WashpointError, WashpointResult};

/// Successful transition: where the booking was and where it ended up.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub booking: Booking,
    pub previous: LifecycleState,
    pub new_state: LifecycleState,
}

/// Operator's answer when finishing an unpaid job.
#[derive(Debug, Clone)]
pub enum PaymentDecision {
    /// Collect payment now; records the paid annotation before finishing.
    PayNow { method: String },
    /// Finish anyway and leave the job marked unpaid for later collection.
    CollectLater,
}

#[derive(Debug, Clone)]
pub enum FinishOutcome {
    Finished {
        booking: Booking,
        new_state: LifecycleState,
        payment_status: PaymentStatus,
    },
    /// The job is unpaid and no decision was supplied; the caller must ask
    /// the operator to pay now or collect later. Not an error.
    PaymentRequired,
}

#[derive(Clone)]
pub struct BookingLifecycleService {
    store: Arc<dyn RecordStore>,
}

impl BookingLifecycleService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Create a booking; it starts life in `draft`.
    pub async fn create_booking(&self, new: NewBooking) -> WashpointResult<Booking> {
        new.validate()?;
        let booking = self.store.insert_booking(new).await?;
        tracing::info!(booking_id = booking.id, "Booking created in draft");
        Ok(booking)
    }

    /// Reset a booking to `draft`. Repeat calls append further history rows;
    /// only the booking row itself is authoritative for current state.
    pub async fn initialize_booking(&self, id: i64) -> WashpointResult<()> {
        match self.store.update_state(id, None, LifecycleState::Draft).await? {
            StateUpdate::Applied(_) => Ok(()),
            StateUpdate::Missing => Err(WashpointError::not_found(format!("booking {id}"))),
            StateUpdate::Conflict { .. } => {
                // Unconditional writes cannot conflict
                Err(WashpointError::internal("unexpected conflict on initialize"))
            }
        }
    }

    /// Current lifecycle state of a booking.
    ///
    /// This read path never fails: a missing booking or an unreachable store
    /// resolves to `draft` with a logged warning, keeping dashboard renders
    /// alive through transient store hiccups.
    pub async fn current_state(&self, id: i64) -> LifecycleState {
        match self.store.fetch_booking(id).await {
            Ok(Some(booking)) => booking.state,
            Ok(None) => {
                tracing::warn!(
                    booking_id = id,
                    "Booking not found while resolving state; defaulting to draft"
                );
                LifecycleState::Draft
            }
            Err(error) => {
                tracing::warn!(
                    booking_id = id,
                    error = %error,
                    "State lookup failed; defaulting to draft"
                );
                LifecycleState::Draft
            }
        }
    }

    /// Actions allowed from a state; empty for terminal states.
    pub fn valid_actions(&self, state: LifecycleState) -> Vec<BookingAction> {
        state.valid_actions()
    }

    /// Apply an action to a booking.
    ///
    /// Reads the current state, validates the action, then writes with the
    /// read state as precondition so a concurrent transition surfaces as a
    /// conflict instead of a silent lost update.
    pub async fn transition(
        &self,
        id: i64,
        action: BookingAction,
    ) -> WashpointResult<TransitionOutcome> {
        let booking = self
            .store
            .fetch_booking(id)
            .await?
            .ok_or_else(|| WashpointError::not_found(format!("booking {id}")))?;

        let current = booking.state;
        let Some(next) = current.apply(action) else {
            return Err(WashpointError::invalid_transition(
                action.as_str(),
                current.as_str(),
            ));
        };

        match self.store.update_state(id, Some(current), next).await? {
            StateUpdate::Applied(booking) => {
                tracing::info!(
                    booking_id = id,
                    action = action.as_str(),
                    from = current.as_str(),
                    to = next.as_str(),
                    "Booking transitioned"
                );
                Ok(TransitionOutcome {
                    booking,
                    previous: current,
                    new_state: next,
                })
            }
            StateUpdate::Missing => Err(WashpointError::not_found(format!("booking {id}"))),
            StateUpdate::Conflict { actual } => Err(WashpointError::conflict(format!(
                "booking {id} changed state to '{actual}' during the transition"
            ))),
        }
    }

    /// Resolved payment status for a booking.
    pub async fn payment_status(&self, id: i64) -> WashpointResult<PaymentStatus> {
        let booking = self
            .store
            .fetch_booking(id)
            .await?
            .ok_or_else(|| WashpointError::not_found(format!("booking {id}")))?;

        Ok(resolve_payment_status(booking.notes.as_deref(), booking.state))
    }

    /// Record a payment by appending the paid annotation to the notes.
    pub async fn record_payment(&self, id: i64, method: &str) -> WashpointResult<Booking> {
        let booking = self
            .store
            .append_notes(id, &payment_annotation(method))
            .await?;
        tracing::info!(booking_id = id, method, "Payment recorded");
        Ok(booking)
    }

    /// Finish a wash, honoring the pay-now-or-collect-later rule.
    ///
    /// Unpaid jobs are not blocked: with no decision the caller gets
    /// [`FinishOutcome::PaymentRequired`] to put in front of the operator;
    /// collect-later finishes anyway and keeps the unpaid marker visible.
    pub async fn finish(
        &self,
        id: i64,
        decision: Option<PaymentDecision>,
    ) -> WashpointResult<FinishOutcome> {
        let booking = self
            .store
            .fetch_booking(id)
            .await?
            .ok_or_else(|| WashpointError::not_found(format!("booking {id}")))?;

        // Validate before touching the notes so a bad finish has no side effects
        if !booking.state.allows(BookingAction::Finish) {
            return Err(WashpointError::invalid_transition(
                BookingAction::Finish.as_str(),
                booking.state.as_str(),
            ));
        }

        let status = resolve_payment_status(booking.notes.as_deref(), booking.state);
        if status == PaymentStatus::Unpaid {
            match decision {
                None => return Ok(FinishOutcome::PaymentRequired),
                Some(PaymentDecision::PayNow { method }) => {
                    self.record_payment(id, &method).await?;
                }
                Some(PaymentDecision::CollectLater) => {
                    // Keep the unpaid status visible on the finished job
                    let has_marker = booking
                        .notes
                        .as_deref()
                        .is_some_and(|notes| notes.contains(UNPAID_MARKER));
                    if !has_marker {
                        self.store.append_notes(id, UNPAID_MARKER).await?;
                    }
                    tracing::warn!(booking_id = id, "Finishing with payment still owed");
                }
            }
        }

        let outcome = self.transition(id, BookingAction::Finish).await?;
        let payment_status = resolve_payment_status(
            outcome.booking.notes.as_deref(),
            outcome.booking.state,
        );

        Ok(FinishOutcome::Finished {
            booking: outcome.booking,
            new_state: outcome.new_state,
            payment_status,
        })
    }

    /// Every booking whose resolved status is unpaid, regardless of
    /// lifecycle state. Finished jobs with money owed stay visible here.
    pub async fn list_unpaid(&self) -> WashpointResult<Vec<Booking>> {
        let bookings = self.store.list_bookings().await?;
        Ok(bookings
            .into_iter()
            .filter(|b| {
                resolve_payment_status(b.notes.as_deref(), b.state) == PaymentStatus::Unpaid
            })
            .collect())
    }

    pub async fn list_bookings(&self) -> WashpointResult<Vec<Booking>> {
        self.store.list_bookings().await
    }

    pub async fn get_booking(&self, id: i64) -> WashpointResult<Option<Booking>> {
        self.store.fetch_booking(id).await
    }

    /// Transition history, newest first.
    pub async fn history(&self, id: i64) -> WashpointResult<Vec<StateTransition>> {
        self.store.transitions(id, None).await
    }

    /// Verify the hash chain of a booking's transition log.
    pub async fn verify_history(&self, id: i64) -> WashpointResult<ChainVerification> {
        let mut records = self.store.transitions(id, None).await?;
        // Stored newest first; the chain walks oldest first
        records.reverse();
        Ok(washpoint_models::verify_chain(&records))
    }
}
