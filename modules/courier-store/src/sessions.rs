// Postgres persistence for in-progress registrations.

use sqlx::PgPool;

use courier_common::{ChatId, PartialRegistration, RegistrationSession, RegistrationStep};

use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct SessionStore {
    pool: PgPool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SessionRow {
    chat_id: i64,
    step: String,
    data: serde_json::Value,
}

impl SessionRow {
    fn into_session(self) -> Result<RegistrationSession> {
        let step = RegistrationStep::from_str(&self.step).ok_or_else(|| {
            StoreError::CorruptRow {
                chat_id: self.chat_id,
                detail: format!("unknown registration step {:?}", self.step),
            }
        })?;
        let data: PartialRegistration =
            serde_json::from_value(self.data).map_err(|e| StoreError::CorruptRow {
                chat_id: self.chat_id,
                detail: format!("bad session data blob: {e}"),
            })?;

        Ok(RegistrationSession {
            id: ChatId(self.chat_id),
            step,
            data,
        })
    }
}

impl SessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: ChatId) -> Result<Option<RegistrationSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT * FROM registration_sessions
            WHERE chat_id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRow::into_session).transpose()
    }

    pub async fn upsert(&self, session: &RegistrationSession) -> Result<()> {
        let data = serde_json::to_value(&session.data)
            .expect("PartialRegistration serialization should never fail");

        sqlx::query(
            r#"
            INSERT INTO registration_sessions (chat_id, step, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (chat_id)
            DO UPDATE SET step = EXCLUDED.step, data = EXCLUDED.data
            "#,
        )
        .bind(session.id.0)
        .bind(session.step.as_str())
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, id: ChatId) -> Result<()> {
        sqlx::query("DELETE FROM registration_sessions WHERE chat_id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
