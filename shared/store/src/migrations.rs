use sqlx::PgPool;

use washpoint_utils::WashpointResult;

pub async fn run_migrations(pool: &PgPool) -> WashpointResult<()> {
    tracing::info!("Running record store migrations");

    // Bookings: the state column is the canonical current state
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bookings (
            id BIGSERIAL PRIMARY KEY,
            customer_id UUID NOT NULL,
            vehicle_id UUID NOT NULL,
            notes TEXT,
            total_price DOUBLE PRECISION NOT NULL,
            state VARCHAR NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only transition log; never read for current state
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS booking_state_transitions (
            id UUID PRIMARY KEY,
            booking_id BIGINT NOT NULL REFERENCES bookings(id),
            old_state VARCHAR,
            new_state VARCHAR NOT NULL,
            occurred_at TIMESTAMPTZ NOT NULL,
            hash VARCHAR NOT NULL,
            previous_hash VARCHAR
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bookings_state ON bookings(state)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transitions_booking_id ON booking_state_transitions(booking_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transitions_occurred_at ON booking_state_transitions(occurred_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Record store migrations completed");
    Ok(())
}
