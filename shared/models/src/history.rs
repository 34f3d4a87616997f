//! Booking state transition history.
//!
//! An append-only audit log of lifecycle transitions. Each record hashes its
//! own contents together with the previous record's hash, forming a
//! per-booking chain that makes after-the-fact edits detectable. The log is
//! never consulted for a booking's current state; the booking row is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::LifecycleState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub id: Uuid,
    pub booking_id: i64,
    /// None for the initializing record of a freshly created booking.
    pub old_state: Option<LifecycleState>,
    pub new_state: LifecycleState,
    pub occurred_at: DateTime<Utc>,
    pub hash: String,
    pub previous_hash: Option<String>,
}

impl StateTransition {
    pub fn new(
        booking_id: i64,
        old_state: Option<LifecycleState>,
        new_state: LifecycleState,
        previous_hash: Option<String>,
    ) -> Self {
        let occurred_at = Utc::now();
        let hash = Self::calculate_hash(
            booking_id,
            old_state,
            new_state,
            &occurred_at,
            previous_hash.as_deref(),
        );

        Self {
            id: Uuid::new_v4(),
            booking_id,
            old_state,
            new_state,
            occurred_at,
            hash,
            previous_hash,
        }
    }

    fn calculate_hash(
        booking_id: i64,
        old_state: Option<LifecycleState>,
        new_state: LifecycleState,
        occurred_at: &DateTime<Utc>,
        previous_hash: Option<&str>,
    ) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(booking_id.to_string().as_bytes());
        hasher.update(old_state.map(|s| s.as_str()).unwrap_or("none").as_bytes());
        hasher.update(new_state.as_str().as_bytes());
        hasher.update(occurred_at.to_rfc3339().as_bytes());
        hasher.update(previous_hash.unwrap_or("").as_bytes());

        hex::encode(hasher.finalize())
    }

    pub fn verify_integrity(&self) -> bool {
        let calculated = Self::calculate_hash(
            self.booking_id,
            self.old_state,
            self.new_state,
            &self.occurred_at,
            self.previous_hash.as_deref(),
        );
        calculated == self.hash
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerification {
    pub is_valid: bool,
    pub entries_verified: usize,
    pub broken_links: Vec<Uuid>,
}

/// Verify a booking's transition chain, ordered oldest first.
///
/// A link is broken when a record's hash no longer matches its contents or
/// its previous_hash does not point at the preceding record.
pub fn verify_chain(transitions: &[StateTransition]) -> ChainVerification {
    let mut broken_links = Vec::new();
    let mut previous_hash: Option<&str> = None;

    for record in transitions {
        if !record.verify_integrity() || record.previous_hash.as_deref() != previous_hash {
            broken_links.push(record.id);
        }
        previous_hash = Some(record.hash.as_str());
    }

    ChainVerification {
        is_valid: broken_links.is_empty(),
        entries_verified: transitions.len(),
        broken_links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    fn chain_of_three() -> Vec<StateTransition> {
        let first = StateTransition::new(7, None, Draft, None);
        let second = StateTransition::new(7, Some(Draft), InProgress, Some(first.hash.clone()));
        let third = StateTransition::new(7, Some(InProgress), Departed, Some(second.hash.clone()));
        vec![first, second, third]
    }

    #[test]
    fn fresh_records_verify() {
        let chain = chain_of_three();
        for record in &chain {
            assert!(record.verify_integrity());
        }
        let verification = verify_chain(&chain);
        assert!(verification.is_valid);
        assert_eq!(verification.entries_verified, 3);
    }

    #[test]
    fn tampered_record_breaks_the_chain() {
        let mut chain = chain_of_three();
        chain[1].new_state = Completed;

        let verification = verify_chain(&chain);
        assert!(!verification.is_valid);
        assert_eq!(verification.broken_links, vec![chain[1].id]);
    }

    #[test]
    fn relinked_chain_is_detected() {
        let mut chain = chain_of_three();
        // Drop the middle record without rewriting the links
        chain.remove(1);

        let verification = verify_chain(&chain);
        assert!(!verification.is_valid);
    }
}
