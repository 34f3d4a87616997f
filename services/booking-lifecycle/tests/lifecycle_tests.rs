//! Integration tests driving the lifecycle service against the in-memory
//! record store.

use std::sync::Arc;

use uuid::Uuid;

use washpoint_booking_lifecycle::service::{
    BookingLifecycleService, FinishOutcome, PaymentDecision,
};
use washpoint_models::{
    BookingAction, LifecycleState, NewBooking, PaymentStatus, PAID_MARKER, UNPAID_MARKER,
};
use washpoint_store::{MemoryRecordStore, RecordStore, StateUpdate};
use washpoint_utils::WashpointError;

fn setup() -> (BookingLifecycleService, Arc<MemoryRecordStore>) {
    let store = Arc::new(MemoryRecordStore::new());
    let service = BookingLifecycleService::new(store.clone());
    (service, store)
}

fn new_booking(notes: Option<&str>) -> NewBooking {
    NewBooking {
        customer_id: Uuid::new_v4(),
        vehicle_id: Uuid::new_v4(),
        notes: notes.map(|n| n.to_string()),
        total_price: 45.0,
    }
}

#[tokio::test]
async fn end_to_end_wash_with_deferred_payment() {
    let (service, _) = setup();

    let booking = service.create_booking(new_booking(None)).await.unwrap();
    assert_eq!(booking.state, LifecycleState::Draft);
    assert_eq!(service.current_state(booking.id).await, LifecycleState::Draft);

    // Start the wash
    let outcome = service
        .transition(booking.id, BookingAction::Start)
        .await
        .unwrap();
    assert_eq!(outcome.new_state, LifecycleState::InProgress);
    assert_eq!(outcome.previous, LifecycleState::Draft);

    // No payment recorded yet: default-closed
    assert_eq!(
        service.payment_status(booking.id).await.unwrap(),
        PaymentStatus::Unpaid
    );

    // Finishing unpaid without a decision asks the operator to choose
    match service.finish(booking.id, None).await.unwrap() {
        FinishOutcome::PaymentRequired => {}
        other => panic!("expected payment-required, got {:?}", other),
    }
    // The choice is offered, not forced: nothing changed yet
    assert_eq!(
        service.current_state(booking.id).await,
        LifecycleState::InProgress
    );

    // Operator chooses to collect later; the finish still succeeds
    match service
        .finish(booking.id, Some(PaymentDecision::CollectLater))
        .await
        .unwrap()
    {
        FinishOutcome::Finished {
            new_state,
            payment_status,
            booking: finished,
        } => {
            assert_eq!(new_state, LifecycleState::Departed);
            assert_eq!(payment_status, PaymentStatus::Unpaid);
            assert!(finished.notes.unwrap().contains(UNPAID_MARKER));
        }
        other => panic!("expected finished, got {:?}", other),
    }

    // The unpaid badge stays visible after finishing
    let unpaid = service.list_unpaid().await.unwrap();
    assert!(unpaid.iter().any(|b| b.id == booking.id));

    // Payment arrives; the appended paid marker wins over the older unpaid one
    let paid = service.record_payment(booking.id, "Cash").await.unwrap();
    let notes = paid.notes.as_deref().unwrap();
    assert!(notes.contains(UNPAID_MARKER));
    assert!(notes.contains("Payment Status: paid | Method: Cash"));
    assert_eq!(
        service.payment_status(booking.id).await.unwrap(),
        PaymentStatus::Paid
    );

    // Close out the job; no decision needed now that it is paid
    match service.finish(booking.id, None).await.unwrap() {
        FinishOutcome::Finished { new_state, .. } => {
            assert_eq!(new_state, LifecycleState::Completed)
        }
        other => panic!("expected finished, got {:?}", other),
    }

    let unpaid = service.list_unpaid().await.unwrap();
    assert!(!unpaid.iter().any(|b| b.id == booking.id));

    // draft init, in_progress, departed, completed
    let history = service.history(booking.id).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].new_state, LifecycleState::Completed);

    let verification = service.verify_history(booking.id).await.unwrap();
    assert!(verification.is_valid);
    assert_eq!(verification.entries_verified, 4);
}

#[tokio::test]
async fn cancelling_a_draft_is_rejected_and_leaves_state_untouched() {
    let (service, _) = setup();
    let booking = service.create_booking(new_booking(None)).await.unwrap();

    let error = service
        .transition(booking.id, BookingAction::Cancel)
        .await
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Transition 'Cancel' is not allowed from state 'draft'"
    );
    assert!(matches!(error, WashpointError::InvalidTransition { .. }));

    // Stored state is unchanged and no history row was appended
    let stored = service.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.state, LifecycleState::Draft);
    assert_eq!(service.history(booking.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn repeating_an_action_fails_once_the_state_has_moved() {
    let (service, _) = setup();
    let booking = service.create_booking(new_booking(None)).await.unwrap();

    service
        .transition(booking.id, BookingAction::Start)
        .await
        .unwrap();

    let error = service
        .transition(booking.id, BookingAction::Start)
        .await
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Transition 'Start' is not allowed from state 'in_progress'"
    );
}

#[tokio::test]
async fn state_reads_fail_open_to_draft() {
    let (service, _) = setup();
    assert_eq!(service.current_state(999).await, LifecycleState::Draft);

    // But a transition on a missing booking is a real error
    let error = service
        .transition(999, BookingAction::Start)
        .await
        .unwrap_err();
    assert!(matches!(error, WashpointError::NotFound { .. }));
}

#[tokio::test]
async fn concurrent_writer_surfaces_as_conflict_not_lost_update() {
    let (service, store) = setup();
    let booking = service.create_booking(new_booking(None)).await.unwrap();

    // Two operators read draft; the first one wins
    let first = store
        .update_state(
            booking.id,
            Some(LifecycleState::Draft),
            LifecycleState::InProgress,
        )
        .await
        .unwrap();
    assert!(matches!(first, StateUpdate::Applied(_)));

    let second = store
        .update_state(
            booking.id,
            Some(LifecycleState::Draft),
            LifecycleState::Booked,
        )
        .await
        .unwrap();
    match second {
        StateUpdate::Conflict { actual } => assert_eq!(actual, LifecycleState::InProgress),
        other => panic!("expected conflict, got {:?}", other),
    }

    // Exactly one transition row beyond the initializing one
    assert_eq!(service.history(booking.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn pay_now_records_the_method_before_finishing() {
    let (service, _) = setup();
    let booking = service.create_booking(new_booking(None)).await.unwrap();
    service
        .transition(booking.id, BookingAction::Start)
        .await
        .unwrap();

    match service
        .finish(
            booking.id,
            Some(PaymentDecision::PayNow {
                method: "Card".to_string(),
            }),
        )
        .await
        .unwrap()
    {
        FinishOutcome::Finished {
            new_state,
            payment_status,
            booking: finished,
        } => {
            assert_eq!(new_state, LifecycleState::Departed);
            assert_eq!(payment_status, PaymentStatus::Paid);
            assert!(finished
                .notes
                .unwrap()
                .contains("Payment Status: paid | Method: Card"));
        }
        other => panic!("expected finished, got {:?}", other),
    }
}

#[tokio::test]
async fn finish_is_not_offered_outside_finishable_states() {
    let (service, _) = setup();
    let booking = service.create_booking(new_booking(None)).await.unwrap();

    let error = service.finish(booking.id, None).await.unwrap_err();
    assert_eq!(
        error.to_string(),
        "Transition 'Finish' is not allowed from state 'draft'"
    );

    // Validation happens before any note mutation
    let stored = service.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.notes, None);
}

#[tokio::test]
async fn manual_confirm_then_cancel_path() {
    let (service, _) = setup();
    let booking = service.create_booking(new_booking(None)).await.unwrap();

    let outcome = service
        .transition(booking.id, BookingAction::ManualConfirm)
        .await
        .unwrap();
    assert_eq!(outcome.new_state, LifecycleState::Booked);

    let outcome = service
        .transition(booking.id, BookingAction::Cancel)
        .await
        .unwrap();
    assert_eq!(outcome.new_state, LifecycleState::Cancelled);

    // Terminal: every further action is rejected
    for action in BookingAction::ALL {
        assert!(service.transition(booking.id, action).await.is_err());
    }
    assert!(service
        .valid_actions(LifecycleState::Cancelled)
        .is_empty());
}

#[tokio::test]
async fn initialize_booking_resets_to_draft() {
    let (service, _) = setup();
    let booking = service.create_booking(new_booking(None)).await.unwrap();
    service
        .transition(booking.id, BookingAction::Start)
        .await
        .unwrap();

    service.initialize_booking(booking.id).await.unwrap();
    assert_eq!(service.current_state(booking.id).await, LifecycleState::Draft);

    // The reset is another history row, not a rewrite
    assert_eq!(service.history(booking.id).await.unwrap().len(), 3);

    let error = service.initialize_booking(999).await.unwrap_err();
    assert!(matches!(error, WashpointError::NotFound { .. }));
}

#[tokio::test]
async fn unpaid_badge_spans_all_lifecycle_states() {
    let (service, _) = setup();

    // A paid booking in progress and an unpaid completed one
    let paid = service
        .create_booking(new_booking(Some("Payment Status: paid | Method: Cash")))
        .await
        .unwrap();
    service
        .transition(paid.id, BookingAction::Start)
        .await
        .unwrap();

    let owed = service
        .create_booking(new_booking(Some(UNPAID_MARKER)))
        .await
        .unwrap();
    service
        .transition(owed.id, BookingAction::Start)
        .await
        .unwrap();
    service
        .finish(owed.id, Some(PaymentDecision::CollectLater))
        .await
        .unwrap();
    service
        .transition(owed.id, BookingAction::Finish)
        .await
        .unwrap();
    assert_eq!(service.current_state(owed.id).await, LifecycleState::Completed);

    let unpaid = service.list_unpaid().await.unwrap();
    assert!(unpaid.iter().any(|b| b.id == owed.id));
    assert!(!unpaid.iter().any(|b| b.id == paid.id));
}

#[tokio::test]
async fn contradictory_markers_resolve_to_paid() {
    let (service, _) = setup();
    let notes = format!("{}\nneeds interior detail\n{} | Method: Cash", UNPAID_MARKER, PAID_MARKER);
    let booking = service
        .create_booking(new_booking(Some(&notes)))
        .await
        .unwrap();

    assert_eq!(
        service.payment_status(booking.id).await.unwrap(),
        PaymentStatus::Paid
    );
}

#[tokio::test]
async fn rejects_invalid_booking_payloads() {
    let (service, _) = setup();
    let error = service
        .create_booking(NewBooking {
            customer_id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            notes: None,
            total_price: -5.0,
        })
        .await
        .unwrap_err();
    assert!(matches!(error, WashpointError::Validation { .. }));
}
