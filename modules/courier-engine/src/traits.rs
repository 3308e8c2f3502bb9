//! Capability traits consumed by the two state machines.
//!
//! The engines never touch a database or the channel transport directly:
//! persistence comes in through `ParticipantRepo`/`SessionRepo` (implemented
//! by the Postgres stores and by in-memory doubles for tests), outbound
//! delivery through `MessageSender`, and operator-facing side channels
//! through `OperatorNotifier`/`BroadcastMonitor`.

use anyhow::Result;
use async_trait::async_trait;

use courier_common::{
    ChatId, CountryCode, MessagePayload, Participant, RegistrationSession,
};

use crate::report::DeliveryProgress;

/// Read access to registered participants.
#[async_trait]
pub trait ParticipantRepo: Send + Sync {
    async fn get(&self, id: ChatId) -> Result<Option<Participant>>;

    /// All participants, most recently registered first.
    async fn list_all(&self) -> Result<Vec<Participant>>;

    /// Exact country match, most recently registered first.
    async fn list_by_country(&self, country: CountryCode) -> Result<Vec<Participant>>;

    async fn count(&self) -> Result<i64>;

    /// Persist a completed registration, atomically retiring the session
    /// for the same identity.
    async fn create(&self, participant: &Participant) -> Result<()>;
}

/// Durable in-progress registration state, keyed by identity.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn get(&self, id: ChatId) -> Result<Option<RegistrationSession>>;
    async fn upsert(&self, session: &RegistrationSession) -> Result<()>;
    async fn delete(&self, id: ChatId) -> Result<()>;
}

/// One delivery attempt failed. Carries the cause for the audit log; the
/// broadcast loop counts it and moves on.
#[derive(Debug, thiserror::Error)]
#[error("{cause}")]
pub struct SendFailure {
    pub cause: String,
}

impl SendFailure {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

/// The one call the core makes into the channel transport. Invoked at most
/// once per recipient per job.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, recipient: ChatId, payload: &MessagePayload) -> Result<(), SendFailure>;
}

/// Per-operator notification of a completed registration. The registration
/// machine fans out over the configured operators itself; a failure here is
/// logged and never rolls back the registration.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(&self, operator: ChatId, participant: &Participant) -> Result<(), SendFailure>;
}

/// Progress surface for a running broadcast. Called at the fixed cadence
/// while the delivery loop runs; rendering is the implementor's problem.
#[async_trait]
pub trait BroadcastMonitor: Send + Sync {
    async fn on_progress(&self, operator: ChatId, progress: &DeliveryProgress);
}

// ---------------------------------------------------------------------------
// Arc blankets — let callers share one implementation across both machines
// ---------------------------------------------------------------------------

#[async_trait]
impl<T: ParticipantRepo + ?Sized> ParticipantRepo for std::sync::Arc<T> {
    async fn get(&self, id: ChatId) -> Result<Option<Participant>> {
        (**self).get(id).await
    }

    async fn list_all(&self) -> Result<Vec<Participant>> {
        (**self).list_all().await
    }

    async fn list_by_country(&self, country: CountryCode) -> Result<Vec<Participant>> {
        (**self).list_by_country(country).await
    }

    async fn count(&self) -> Result<i64> {
        (**self).count().await
    }

    async fn create(&self, participant: &Participant) -> Result<()> {
        (**self).create(participant).await
    }
}

#[async_trait]
impl<T: SessionRepo + ?Sized> SessionRepo for std::sync::Arc<T> {
    async fn get(&self, id: ChatId) -> Result<Option<RegistrationSession>> {
        (**self).get(id).await
    }

    async fn upsert(&self, session: &RegistrationSession) -> Result<()> {
        (**self).upsert(session).await
    }

    async fn delete(&self, id: ChatId) -> Result<()> {
        (**self).delete(id).await
    }
}

#[async_trait]
impl<T: MessageSender + ?Sized> MessageSender for std::sync::Arc<T> {
    async fn send(&self, recipient: ChatId, payload: &MessagePayload) -> Result<(), SendFailure> {
        (**self).send(recipient, payload).await
    }
}

#[async_trait]
impl<T: OperatorNotifier + ?Sized> OperatorNotifier for std::sync::Arc<T> {
    async fn notify(&self, operator: ChatId, participant: &Participant) -> Result<(), SendFailure> {
        (**self).notify(operator, participant).await
    }
}

#[async_trait]
impl<T: BroadcastMonitor + ?Sized> BroadcastMonitor for std::sync::Arc<T> {
    async fn on_progress(&self, operator: ChatId, progress: &DeliveryProgress) {
        (**self).on_progress(operator, progress).await
    }
}
