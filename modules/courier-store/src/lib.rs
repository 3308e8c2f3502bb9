//! Postgres persistence for courier.
//!
//! Two tables: `participants` (completed registrations) and
//! `registration_sessions` (durable in-progress flows). The one multi-row
//! invariant — a completed participant and a live session never coexist —
//! is enforced by `ParticipantStore::create`, which inserts the participant
//! and deletes the session in a single transaction.

pub mod error;
pub mod participants;
pub mod sessions;

pub use error::{Result, StoreError};
pub use participants::{CountryCount, ParticipantStore};
pub use sessions::SessionStore;

use sqlx::PgPool;

/// Run the embedded SQL migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(e.into()))?;
    Ok(())
}
