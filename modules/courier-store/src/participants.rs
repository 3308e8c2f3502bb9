// Postgres persistence for registered participants.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use courier_common::{ChatId, CountryCode, LanguageCode, Participant};

use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct ParticipantStore {
    pool: PgPool,
}

/// A row from the participants table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ParticipantRow {
    chat_id: i64,
    name: String,
    phone: String,
    language: String,
    country: String,
    registered_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl ParticipantRow {
    fn into_participant(self) -> Result<Participant> {
        let language = LanguageCode::from_code(&self.language).ok_or_else(|| {
            StoreError::CorruptRow {
                chat_id: self.chat_id,
                detail: format!("unknown language code {:?}", self.language),
            }
        })?;
        let country = CountryCode::from_code(&self.country).ok_or_else(|| {
            StoreError::CorruptRow {
                chat_id: self.chat_id,
                detail: format!("unknown country code {:?}", self.country),
            }
        })?;

        Ok(Participant {
            id: ChatId(self.chat_id),
            name: self.name,
            phone: self.phone,
            language,
            country,
            registered_at: self.registered_at,
            last_active: self.last_active,
        })
    }
}

/// Per-country participant count, for the operator statistics panel.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CountryCount {
    pub country: String,
    pub count: i64,
}

impl ParticipantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: ChatId) -> Result<Option<Participant>> {
        let row = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT * FROM participants
            WHERE chat_id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ParticipantRow::into_participant).transpose()
    }

    /// Insert the completed participant and retire any registration session
    /// for the same identity, in one transaction. A crash can never leave
    /// both rows (or neither) behind.
    pub async fn create(&self, p: &Participant) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO participants
                (chat_id, name, phone, language, country, registered_at, last_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(p.id.0)
        .bind(&p.name)
        .bind(&p.phone)
        .bind(p.language.code())
        .bind(p.country.code())
        .bind(p.registered_at)
        .bind(p.last_active)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM registration_sessions WHERE chat_id = $1")
            .bind(p.id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// All participants, most recently registered first.
    pub async fn list_all(&self) -> Result<Vec<Participant>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT * FROM participants
            ORDER BY registered_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(ParticipantRow::into_participant)
            .collect()
    }

    /// Participants with an exact country match, most recent first.
    pub async fn list_by_country(&self, country: CountryCode) -> Result<Vec<Participant>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT * FROM participants
            WHERE country = $1
            ORDER BY registered_at DESC
            "#,
        )
        .bind(country.code())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(ParticipantRow::into_participant)
            .collect()
    }

    /// Latest registrations, for the operator recent-participants panel.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Participant>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT * FROM participants
            ORDER BY registered_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(ParticipantRow::into_participant)
            .collect()
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM participants")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_by_country(&self) -> Result<Vec<CountryCount>> {
        let rows = sqlx::query_as::<_, CountryCount>(
            r#"
            SELECT country, COUNT(*) AS count
            FROM participants
            GROUP BY country
            ORDER BY count DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Refresh last_active. A no-op for unknown ids.
    pub async fn touch_last_active(&self, id: ChatId) -> Result<()> {
        sqlx::query("UPDATE participants SET last_active = now() WHERE chat_id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
