//! Booking Lifecycle State Machine
//!
//! Defines the lifecycle states a booking moves through and the legal
//! transitions between them. The booking row's state column is the single
//! canonical representation of "current"; the transition log is audit only.

use serde::{Deserialize, Serialize};

/// Lifecycle states of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Booking created but not confirmed or started
    Draft,
    /// Booking confirmed for a slot
    Booked,
    /// Wash is underway
    InProgress,
    /// Vehicle has left the bay, job awaiting close-out
    Departed,
    /// Job closed out
    Completed,
    /// Booking was cancelled
    Cancelled,
}

/// Operator actions that drive transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    Start,
    ManualConfirm,
    Finish,
    Cancel,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 6] = [
        LifecycleState::Draft,
        LifecycleState::Booked,
        LifecycleState::InProgress,
        LifecycleState::Departed,
        LifecycleState::Completed,
        LifecycleState::Cancelled,
    ];

    /// Resolve the target state for an action, or None when the action is
    /// not legal from this state.
    ///
    /// Draft bookings cannot be cancelled outright (confirm or start first),
    /// and departed vehicles can only be finished, never cancelled.
    pub fn apply(&self, action: BookingAction) -> Option<LifecycleState> {
        use BookingAction::*;
        use LifecycleState::*;

        match (self, action) {
            // From Draft
            (Draft, Start) => Some(InProgress),
            (Draft, ManualConfirm) => Some(Booked),

            // From Booked
            (Booked, Start) => Some(InProgress),
            (Booked, Cancel) => Some(Cancelled),

            // From InProgress
            (InProgress, Finish) => Some(Departed),
            (InProgress, Cancel) => Some(Cancelled),

            // From Departed
            (Departed, Finish) => Some(Completed),

            // Terminal states have no outgoing transitions
            (Completed, _) => None,
            (Cancelled, _) => None,

            _ => None,
        }
    }

    /// Check if an action is valid from this state
    pub fn allows(&self, action: BookingAction) -> bool {
        self.apply(action).is_some()
    }

    /// Actions allowed from this state; empty for terminal states
    pub fn valid_actions(&self) -> Vec<BookingAction> {
        BookingAction::ALL
            .iter()
            .copied()
            .filter(|action| self.allows(*action))
            .collect()
    }

    /// Check if the state has no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Completed | LifecycleState::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Booked => "booked",
            Self::InProgress => "in_progress",
            Self::Departed => "departed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from the stored lowercase name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "booked" => Some(Self::Booked),
            "in_progress" => Some(Self::InProgress),
            "departed" => Some(Self::Departed),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl BookingAction {
    pub const ALL: [BookingAction; 4] = [
        BookingAction::Start,
        BookingAction::ManualConfirm,
        BookingAction::Finish,
        BookingAction::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::ManualConfirm => "Manual Confirm",
            Self::Finish => "Finish",
            Self::Cancel => "Cancel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "manual confirm" | "manual_confirm" | "confirm" => Some(Self::ManualConfirm),
            "finish" => Some(Self::Finish),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
