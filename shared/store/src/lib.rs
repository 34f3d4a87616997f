//! Record store for the booking lifecycle core.
//!
//! The core talks to persistence through the [`RecordStore`] trait: typed
//! CRUD over the *bookings* collection and the append-only *booking state
//! transitions* collection. Two backends are provided: Postgres via sqlx and
//! an in-memory store used by tests and small deployments.

pub mod memory;
pub mod migrations;
pub mod pg;
pub mod postgres;
pub mod record_store;

pub use memory::MemoryRecordStore;
pub use pg::PgRecordStore;
pub use postgres::{create_postgres_pool, health_check, PostgresPool};
pub use record_store::{RecordStore, StateUpdate};
