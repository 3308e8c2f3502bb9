//! The registration state machine.
//!
//! Drives one participant from first contact to a committed `Participant`
//! record through three steps: phone → language → country. Session state is
//! durable; a partially complete registration is never visible as a
//! participant. Malformed input re-prompts and never advances the step, so
//! the user can retry indefinitely and duplicate callbacks are no-ops.

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use courier_common::{
    normalize_phone, ChatId, CountryCode, LanguageCode, Participant, RegistrationSession,
    RegistrationStep,
};

use crate::reply::Reply;
use crate::traits::{OperatorNotifier, ParticipantRepo, SessionRepo};

pub struct RegistrationFlow<P, S, N> {
    participants: P,
    sessions: S,
    notifier: N,
    operators: Vec<ChatId>,
}

impl<P, S, N> RegistrationFlow<P, S, N>
where
    P: ParticipantRepo,
    S: SessionRepo,
    N: OperatorNotifier,
{
    pub fn new(participants: P, sessions: S, notifier: N, operators: Vec<ChatId>) -> Self {
        Self {
            participants,
            sessions,
            notifier,
            operators,
        }
    }

    /// First contact from an identity. Existing participants bypass the
    /// machine entirely — even when a stale session survived a crash, the
    /// participant record wins. Otherwise a fresh session is created at
    /// `AwaitingPhone`.
    pub async fn on_first_contact(&self, id: ChatId, display_name: &str) -> Result<Reply> {
        if let Some(existing) = self.participants.get(id).await? {
            return Ok(Reply::AlreadyRegistered {
                name: existing.name,
            });
        }

        let session = RegistrationSession::new(id);
        self.sessions.upsert(&session).await?;
        info!(chat_id = %id, "Registration started");

        Ok(Reply::PhonePrompt {
            greeting_name: display_name.to_string(),
        })
    }

    /// A structured contact credential arrived. Only accepted while the
    /// session is at `AwaitingPhone`; any other step re-prompts for what
    /// that step actually expects.
    pub async fn on_contact_credential(&self, id: ChatId, phone: &str, name: &str) -> Result<Reply> {
        let Some(mut session) = self.governing_session(id).await? else {
            return Ok(Reply::SessionMissing);
        };

        match session.step {
            RegistrationStep::AwaitingPhone => {
                session.data.name = Some(name.to_string());
                session.data.phone = Some(normalize_phone(phone));
                session.step = RegistrationStep::AwaitingLanguage;
                self.sessions.upsert(&session).await?;
                Ok(Reply::LanguagePrompt)
            }
            RegistrationStep::AwaitingLanguage => Ok(Reply::LanguagePrompt),
            RegistrationStep::AwaitingCountry => self.country_reprompt(&session),
        }
    }

    /// Anything that is not a contact credential while the phone step is
    /// active lands here: re-prompt, no state change.
    pub async fn on_unexpected_input(&self, id: ChatId) -> Result<Reply> {
        let Some(session) = self.governing_session(id).await? else {
            return Ok(Reply::SessionMissing);
        };

        Ok(match session.step {
            RegistrationStep::AwaitingPhone => Reply::PhoneRejected,
            RegistrationStep::AwaitingLanguage => Reply::LanguagePrompt,
            RegistrationStep::AwaitingCountry => self.country_reprompt(&session)?,
        })
    }

    /// A language selection callback. The raw code is validated against the
    /// enumerated set here, so an unknown code rejects without advancing.
    pub async fn on_language_choice(&self, id: ChatId, code: &str) -> Result<Reply> {
        let Some(mut session) = self.governing_session(id).await? else {
            return Ok(Reply::SessionMissing);
        };

        match session.step {
            RegistrationStep::AwaitingLanguage => {
                let Some(language) = LanguageCode::from_code(code) else {
                    return Ok(Reply::LanguageRejected);
                };
                session.data.language = Some(language);
                session.step = RegistrationStep::AwaitingCountry;
                self.sessions.upsert(&session).await?;
                Ok(Reply::CountryPrompt { language })
            }
            // Duplicate or out-of-order callback: re-prompt the current step.
            RegistrationStep::AwaitingPhone => Ok(Reply::PhoneRejected),
            RegistrationStep::AwaitingCountry => self.country_reprompt(&session),
        }
    }

    /// A country selection callback. On success the participant is committed
    /// and the session retired in one atomic step, then operators are
    /// notified; a notification failure never rolls anything back.
    pub async fn on_country_choice(&self, id: ChatId, code: &str) -> Result<Reply> {
        let Some(session) = self.governing_session(id).await? else {
            return Ok(Reply::SessionMissing);
        };

        match session.step {
            RegistrationStep::AwaitingCountry => {
                let Some(country) = CountryCode::from_code(code) else {
                    return Ok(Reply::CountryRejected);
                };

                // All three accumulated fields must be present by now; a blob
                // missing them means the session rows were tampered with.
                let (Some(name), Some(phone), Some(language)) = (
                    session.data.name.clone(),
                    session.data.phone.clone(),
                    session.data.language,
                ) else {
                    warn!(chat_id = %id, "Session at country step with incomplete data, restarting");
                    self.sessions.delete(id).await?;
                    return Ok(Reply::SessionMissing);
                };

                let now = Utc::now();
                let participant = Participant {
                    id,
                    name,
                    phone,
                    language,
                    country,
                    registered_at: now,
                    last_active: now,
                };

                self.participants.create(&participant).await?;
                info!(
                    chat_id = %id,
                    country = country.code(),
                    language = language.code(),
                    "Participant registered"
                );

                self.notify_operators(&participant).await;

                Ok(Reply::RegistrationComplete { participant })
            }
            RegistrationStep::AwaitingPhone => Ok(Reply::PhoneRejected),
            RegistrationStep::AwaitingLanguage => Ok(Reply::LanguagePrompt),
        }
    }

    /// Explicit cancellation. Deletes the session unconditionally; safe to
    /// call with no session at all.
    pub async fn on_cancel(&self, id: ChatId) -> Result<Reply> {
        self.sessions.delete(id).await?;
        Ok(Reply::RegistrationCancelled)
    }

    /// The session governing this identity, if any. A session shadowed by an
    /// existing participant record (possible only after a crash between the
    /// commit steps, which the transactional store prevents, or operator
    /// tampering) is treated as absent.
    async fn governing_session(&self, id: ChatId) -> Result<Option<RegistrationSession>> {
        if self.participants.get(id).await?.is_some() {
            return Ok(None);
        }
        self.sessions.get(id).await
    }

    fn country_reprompt(&self, session: &RegistrationSession) -> Result<Reply> {
        // The language field is guaranteed set once the country step is
        // reached; fall back to the rejection reply if the blob is short.
        Ok(match session.data.language {
            Some(language) => Reply::CountryPrompt { language },
            None => Reply::CountryRejected,
        })
    }

    async fn notify_operators(&self, participant: &Participant) {
        for &operator in &self.operators {
            match self.notifier.notify(operator, participant).await {
                Ok(()) => {
                    info!(operator = %operator, participant = %participant.id, "Operator notified of registration");
                }
                Err(e) => {
                    warn!(operator = %operator, error = %e, "Failed to notify operator of registration");
                }
            }
        }
    }
}
