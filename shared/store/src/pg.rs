//! Postgres-backed record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use washpoint_models::{Booking, LifecycleState, NewBooking, StateTransition};
use washpoint_utils::WashpointResult;

use crate::record_store::{RecordStore, StateUpdate};

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, FromRow)]
struct BookingRow {
    id: i64,
    customer_id: Uuid,
    vehicle_id: Uuid,
    notes: Option<String>,
    total_price: f64,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            customer_id: row.customer_id,
            vehicle_id: row.vehicle_id,
            notes: row.notes,
            total_price: row.total_price,
            state: parse_state_or_draft(row.id, &row.state),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// An unreadable state column falls open to draft rather than failing the
/// read path; the anomaly is logged for operators.
fn parse_state_or_draft(booking_id: i64, raw: &str) -> LifecycleState {
    LifecycleState::parse(raw).unwrap_or_else(|| {
        tracing::warn!(
            booking_id,
            state = raw,
            "Unreadable lifecycle state in store; defaulting to draft"
        );
        LifecycleState::Draft
    })
}

#[derive(Debug, Clone, FromRow)]
struct TransitionRow {
    id: Uuid,
    booking_id: i64,
    old_state: Option<String>,
    new_state: String,
    occurred_at: DateTime<Utc>,
    hash: String,
    previous_hash: Option<String>,
}

impl From<TransitionRow> for StateTransition {
    fn from(row: TransitionRow) -> Self {
        StateTransition {
            id: row.id,
            booking_id: row.booking_id,
            old_state: row.old_state.as_deref().and_then(LifecycleState::parse),
            new_state: parse_state_or_draft(row.booking_id, &row.new_state),
            occurred_at: row.occurred_at,
            hash: row.hash,
            previous_hash: row.previous_hash,
        }
    }
}

const BOOKING_COLUMNS: &str =
    "id, customer_id, vehicle_id, notes, total_price, state, created_at, updated_at";

const TRANSITION_COLUMNS: &str =
    "id, booking_id, old_state, new_state, occurred_at, hash, previous_hash";

async fn insert_transition(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    record: &StateTransition,
) -> WashpointResult<()> {
    sqlx::query(
        r#"
        INSERT INTO booking_state_transitions
            (id, booking_id, old_state, new_state, occurred_at, hash, previous_hash)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(record.id)
    .bind(record.booking_id)
    .bind(record.old_state.map(|s| s.as_str()))
    .bind(record.new_state.as_str())
    .bind(record.occurred_at)
    .bind(&record.hash)
    .bind(&record.previous_hash)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn latest_hash(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    booking_id: i64,
) -> WashpointResult<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT hash FROM booking_state_transitions
        WHERE booking_id = $1
        ORDER BY occurred_at DESC
        LIMIT 1
        "#,
    )
    .bind(booking_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(|(hash,)| hash))
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert_booking(&self, new: NewBooking) -> WashpointResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let row: BookingRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO bookings
                (customer_id, vehicle_id, notes, total_price, state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {BOOKING_COLUMNS}
            "#,
        ))
        .bind(new.customer_id)
        .bind(new.vehicle_id)
        .bind(&new.notes)
        .bind(new.total_price)
        .bind(LifecycleState::Draft.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let record = StateTransition::new(row.id, None, LifecycleState::Draft, None);
        insert_transition(&mut tx, &record).await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn fetch_booking(&self, id: i64) -> WashpointResult<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_bookings(&self) -> WashpointResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update_state(
        &self,
        id: i64,
        expected: Option<LifecycleState>,
        next: LifecycleState,
    ) -> WashpointResult<StateUpdate> {
        let mut tx = self.pool.begin().await?;

        // Row lock so the precondition check and the write are one unit
        let current: Option<(String,)> =
            sqlx::query_as("SELECT state FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((state_text,)) = current else {
            return Ok(StateUpdate::Missing);
        };
        let actual = parse_state_or_draft(id, &state_text);

        if let Some(expected) = expected {
            if actual != expected {
                return Ok(StateUpdate::Conflict { actual });
            }
        }

        let row: BookingRow = sqlx::query_as(&format!(
            r#"
            UPDATE bookings SET state = $2, updated_at = $3
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(next.as_str())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let previous_hash = latest_hash(&mut tx, id).await?;
        let record = StateTransition::new(id, Some(actual), next, previous_hash);
        insert_transition(&mut tx, &record).await?;

        tx.commit().await?;
        Ok(StateUpdate::Applied(row.into()))
    }

    async fn append_notes(&self, id: i64, fragment: &str) -> WashpointResult<Booking> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            r#"
            UPDATE bookings
            SET notes = CASE
                    WHEN notes IS NULL OR notes = '' THEN $2
                    ELSE notes || E'\n' || $2
                END,
                updated_at = $3
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(fragment)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into())
            .ok_or_else(|| washpoint_utils::WashpointError::not_found(format!("booking {id}")))
    }

    async fn transitions(
        &self,
        booking_id: i64,
        limit: Option<i64>,
    ) -> WashpointResult<Vec<StateTransition>> {
        let rows: Vec<TransitionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {TRANSITION_COLUMNS} FROM booking_state_transitions
            WHERE booking_id = $1
            ORDER BY occurred_at DESC
            LIMIT $2
            "#,
        ))
        .bind(booking_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}
