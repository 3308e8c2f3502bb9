//! Repo trait implementations.
//!
//! Adapts the concrete Postgres stores to the engine's capability traits,
//! and provides `MemoryStore` so tests run without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use courier_common::{ChatId, CountryCode, Participant, RegistrationSession};

use crate::traits::{ParticipantRepo, SessionRepo};

// ---------------------------------------------------------------------------
// Postgres adapters (production)
// ---------------------------------------------------------------------------

#[async_trait]
impl ParticipantRepo for courier_store::ParticipantStore {
    async fn get(&self, id: ChatId) -> Result<Option<Participant>> {
        Ok(courier_store::ParticipantStore::get(self, id).await?)
    }

    async fn list_all(&self) -> Result<Vec<Participant>> {
        Ok(courier_store::ParticipantStore::list_all(self).await?)
    }

    async fn list_by_country(&self, country: CountryCode) -> Result<Vec<Participant>> {
        Ok(courier_store::ParticipantStore::list_by_country(self, country).await?)
    }

    async fn count(&self) -> Result<i64> {
        Ok(courier_store::ParticipantStore::count(self).await?)
    }

    async fn create(&self, participant: &Participant) -> Result<()> {
        Ok(courier_store::ParticipantStore::create(self, participant).await?)
    }
}

#[async_trait]
impl SessionRepo for courier_store::SessionStore {
    async fn get(&self, id: ChatId) -> Result<Option<RegistrationSession>> {
        Ok(courier_store::SessionStore::get(self, id).await?)
    }

    async fn upsert(&self, session: &RegistrationSession) -> Result<()> {
        Ok(courier_store::SessionStore::upsert(self, session).await?)
    }

    async fn delete(&self, id: ChatId) -> Result<()> {
        Ok(courier_store::SessionStore::delete(self, id).await?)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore (tests — no database required)
// ---------------------------------------------------------------------------

/// In-memory participants + sessions behind one struct, so the atomic
/// commit-and-retire step can be emulated faithfully. Share via `Arc` to use
/// it as both repos at once. Thread-safe.
#[derive(Default)]
pub struct MemoryStore {
    participants: Mutex<Vec<Participant>>,
    sessions: Mutex<HashMap<ChatId, RegistrationSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pre-registered participant (for test setup).
    pub fn seed_participant(&self, participant: Participant) {
        self.participants.lock().unwrap().push(participant);
    }

    /// Number of live sessions (for test assertions).
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Snapshot of a stored participant (for test assertions).
    pub fn participant(&self, id: ChatId) -> Option<Participant> {
        self.participants
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    fn sorted_desc(mut items: Vec<Participant>) -> Vec<Participant> {
        items.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        items
    }
}

#[async_trait]
impl ParticipantRepo for MemoryStore {
    async fn get(&self, id: ChatId) -> Result<Option<Participant>> {
        Ok(self
            .participants
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Participant>> {
        Ok(Self::sorted_desc(self.participants.lock().unwrap().clone()))
    }

    async fn list_by_country(&self, country: CountryCode) -> Result<Vec<Participant>> {
        let matching = self
            .participants
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.country == country)
            .cloned()
            .collect();
        Ok(Self::sorted_desc(matching))
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.participants.lock().unwrap().len() as i64)
    }

    async fn create(&self, participant: &Participant) -> Result<()> {
        let mut participants = self.participants.lock().unwrap();
        let mut sessions = self.sessions.lock().unwrap();
        participants.push(participant.clone());
        sessions.remove(&participant.id);
        Ok(())
    }
}

#[async_trait]
impl SessionRepo for MemoryStore {
    async fn get(&self, id: ChatId) -> Result<Option<RegistrationSession>> {
        Ok(self.sessions.lock().unwrap().get(&id).cloned())
    }

    async fn upsert(&self, session: &RegistrationSession) -> Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn delete(&self, id: ChatId) -> Result<()> {
        self.sessions.lock().unwrap().remove(&id);
        Ok(())
    }
}
