//! The broadcast engine.
//!
//! One job per operator at a time: choose an audience, capture a message,
//! confirm, then deliver strictly sequentially with per-recipient failure
//! isolation — an unreachable recipient is counted and skipped, never
//! aborting the batch. No cancellation once sending has begun.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{info, warn};

use courier_common::{ChatId, MessagePayload, TargetSpec};

use crate::audience;
use crate::reply::Reply;
use crate::report::{DeliveryProgress, DeliveryReport};
use crate::traits::{BroadcastMonitor, MessageSender, ParticipantRepo};

const PREVIEW_CHARS: usize = 200;
const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobPhase {
    SelectingAudience,
    /// Single-recipient target chosen, waiting for the id entry.
    AwaitingRecipient,
    AwaitingMessage,
    AwaitingConfirmation,
}

/// One operator's in-flight broadcast. Replaced wholesale on every fresh
/// entry so nothing leaks from an abandoned job.
#[derive(Debug, Clone)]
struct BroadcastJob {
    phase: JobPhase,
    target: Option<TargetSpec>,
    payload: Option<MessagePayload>,
}

impl BroadcastJob {
    fn new() -> Self {
        Self {
            phase: JobPhase::SelectingAudience,
            target: None,
            payload: None,
        }
    }
}

pub struct Broadcaster<P, M, Mon> {
    participants: P,
    sender: M,
    monitor: Mon,
    operators: HashSet<ChatId>,
    jobs: Mutex<HashMap<ChatId, BroadcastJob>>,
}

impl<P, M, Mon> Broadcaster<P, M, Mon>
where
    P: ParticipantRepo,
    M: MessageSender,
    Mon: BroadcastMonitor,
{
    pub fn new(participants: P, sender: M, monitor: Mon, operators: Vec<ChatId>) -> Self {
        Self {
            participants,
            sender,
            monitor,
            operators: operators.into_iter().collect(),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// True if this operator currently holds a job in any phase. The
    /// dispatcher uses this to decide whether a free-form message belongs
    /// to the broadcast flow.
    pub async fn has_active_job(&self, operator: ChatId) -> bool {
        self.jobs.lock().await.contains_key(&operator)
    }

    /// Entry point: `/broadcast` (or equivalent). Replaces any previous job
    /// with a fresh one in the audience-selection phase.
    pub async fn on_operator_command(&self, operator: ChatId) -> Result<Reply> {
        if !self.operators.contains(&operator) {
            return Ok(Reply::Denied);
        }

        let total_participants = self.participants.count().await?;
        self.jobs.lock().await.insert(operator, BroadcastJob::new());

        Ok(Reply::AudiencePrompt { total_participants })
    }

    /// A complete target specification was selected. `All`/`Country` move
    /// straight to message capture; a single-participant target is checked
    /// for existence first and keeps the selection phase on failure.
    pub async fn on_audience_selected(&self, operator: ChatId, target: TargetSpec) -> Result<Reply> {
        if !self.operators.contains(&operator) {
            return Ok(Reply::Denied);
        }

        let mut jobs = self.jobs.lock().await;
        let Some(mut job) = jobs.remove(&operator) else {
            return self.restart(jobs, operator).await;
        };

        // Only confirm or cancel are honored at the confirmation gate; a
        // stale selection callback must not disturb the pending job.
        if job.phase == JobPhase::AwaitingConfirmation {
            jobs.insert(operator, job);
            return Ok(Reply::ConfirmationPending);
        }

        if let TargetSpec::Participant { id } = target {
            if self.participants.get(id).await?.is_none() {
                // Still selecting; the job survives untouched.
                jobs.insert(operator, job);
                return Ok(Reply::UnknownRecipient { id });
            }
        }

        job.target = Some(target);
        job.payload = None;
        job.phase = JobPhase::AwaitingMessage;
        jobs.insert(operator, job);

        Ok(Reply::MessagePrompt { target })
    }

    /// Operator picked the single-participant target kind but has not named
    /// the recipient yet.
    pub async fn on_recipient_requested(&self, operator: ChatId) -> Result<Reply> {
        if !self.operators.contains(&operator) {
            return Ok(Reply::Denied);
        }

        let mut jobs = self.jobs.lock().await;
        let Some(mut job) = jobs.remove(&operator) else {
            return self.restart(jobs, operator).await;
        };

        if job.phase == JobPhase::AwaitingConfirmation {
            jobs.insert(operator, job);
            return Ok(Reply::ConfirmationPending);
        }

        job.phase = JobPhase::AwaitingRecipient;
        jobs.insert(operator, job);
        Ok(Reply::RecipientPrompt)
    }

    /// Free-form operator input while a job is active. Routed by phase:
    /// recipient-id entry, payload capture, or ignored noise at the
    /// confirmation gate. Returns `None` when the operator holds no job at
    /// all, so the dispatcher can fall through to menu handling.
    pub async fn on_operator_message(
        &self,
        operator: ChatId,
        payload: MessagePayload,
    ) -> Result<Option<Reply>> {
        if !self.operators.contains(&operator) {
            return Ok(None);
        }

        let phase = {
            let jobs = self.jobs.lock().await;
            match jobs.get(&operator) {
                Some(job) => job.phase,
                None => return Ok(None),
            }
        };

        let reply = match phase {
            JobPhase::AwaitingRecipient => {
                let MessagePayload::Text { ref body } = payload else {
                    return Ok(Some(Reply::RecipientRejected));
                };
                match body.trim().parse::<i64>() {
                    Ok(raw) => {
                        self.on_audience_selected(operator, TargetSpec::Participant {
                            id: ChatId(raw),
                        })
                        .await?
                    }
                    Err(_) => Reply::RecipientRejected,
                }
            }
            JobPhase::AwaitingMessage => self.on_message_captured(operator, payload).await?,
            // Neither confirm nor cancel: ignored, payload untouched.
            JobPhase::AwaitingConfirmation => Reply::ConfirmationPending,
            JobPhase::SelectingAudience => Reply::AudiencePrompt {
                total_participants: self.participants.count().await?,
            },
        };

        Ok(Some(reply))
    }

    /// Capture the payload verbatim and resolve the audience once for the
    /// emptiness check and the size shown at the confirmation gate. The
    /// final recipient list is resolved again at confirm time.
    pub async fn on_message_captured(
        &self,
        operator: ChatId,
        payload: MessagePayload,
    ) -> Result<Reply> {
        if !self.operators.contains(&operator) {
            return Ok(Reply::Denied);
        }

        let mut jobs = self.jobs.lock().await;
        let Some(mut job) = jobs.remove(&operator) else {
            return self.restart(jobs, operator).await;
        };

        match job.phase {
            JobPhase::AwaitingMessage => {}
            JobPhase::AwaitingConfirmation => {
                jobs.insert(operator, job);
                return Ok(Reply::ConfirmationPending);
            }
            JobPhase::AwaitingRecipient => {
                jobs.insert(operator, job);
                return Ok(Reply::RecipientPrompt);
            }
            // Still selecting; a payload is premature.
            JobPhase::SelectingAudience => {
                jobs.insert(operator, job);
                return Ok(Reply::AudiencePrompt {
                    total_participants: self.participants.count().await?,
                });
            }
        }
        let Some(target) = job.target else {
            jobs.insert(operator, job);
            return Ok(Reply::AudiencePrompt {
                total_participants: self.participants.count().await?,
            });
        };

        let recipients = audience::resolve(&self.participants, target, operator).await?;
        if recipients.is_empty() {
            // Job discarded; the operator starts over.
            return Ok(Reply::NoRecipients);
        }

        let preview = payload.preview(PREVIEW_CHARS);
        job.payload = Some(payload);
        job.phase = JobPhase::AwaitingConfirmation;
        jobs.insert(operator, job);

        Ok(Reply::ConfirmPrompt {
            target,
            preview,
            audience_size: recipients.len(),
        })
    }

    /// The confirmation gate was passed. The audience is re-resolved with
    /// the freshest data, then the delivery loop runs to exhaustion — no
    /// cancellation, no per-recipient retry. The job is cleared
    /// unconditionally afterwards.
    pub async fn on_confirm(&self, operator: ChatId) -> Result<Reply> {
        if !self.operators.contains(&operator) {
            return Ok(Reply::Denied);
        }

        let (target, payload) = {
            let mut jobs = self.jobs.lock().await;
            match jobs.remove(&operator) {
                None => return self.restart(jobs, operator).await,
                Some(job) if job.phase != JobPhase::AwaitingConfirmation => {
                    jobs.insert(operator, job);
                    return Ok(Reply::ConfirmationPending);
                }
                Some(job) => match (job.target, job.payload) {
                    (Some(target), Some(payload)) => (target, payload),
                    // A confirmed job always carries both; anything else is
                    // a lost job — start over.
                    _ => return self.restart(jobs, operator).await,
                },
            }
        };

        let recipients = audience::resolve(&self.participants, target, operator).await?;
        if recipients.is_empty() {
            // Audience drained between capture and confirm.
            return Ok(Reply::NoRecipients);
        }

        let report = self.deliver(operator, &recipients, &payload).await;
        info!(
            operator = %operator,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "Broadcast complete"
        );

        Ok(Reply::BroadcastReport { target, report })
    }

    /// Cancel at any pre-sending phase. Clears the job unconditionally;
    /// safe with no job held.
    pub async fn on_cancel(&self, operator: ChatId) -> Result<Reply> {
        if !self.operators.contains(&operator) {
            return Ok(Reply::Denied);
        }

        self.jobs.lock().await.remove(&operator);
        Ok(Reply::BroadcastCancelled)
    }

    /// Strictly sequential delivery with per-recipient failure isolation.
    /// Progress is surfaced every `PROGRESS_EVERY` recipients and on the
    /// final one.
    async fn deliver(
        &self,
        operator: ChatId,
        recipients: &[ChatId],
        payload: &MessagePayload,
    ) -> DeliveryReport {
        let total = recipients.len();
        let mut succeeded = 0usize;
        let mut failed = 0usize;

        for (i, &recipient) in recipients.iter().enumerate() {
            match self.sender.send(recipient, payload).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    failed += 1;
                    warn!(recipient = %recipient, error = %e, "Delivery failed");
                }
            }

            let processed = i + 1;
            if processed % PROGRESS_EVERY == 0 || processed == total {
                self.monitor
                    .on_progress(
                        operator,
                        &DeliveryProgress {
                            processed,
                            total,
                            succeeded,
                            failed,
                        },
                    )
                    .await;
            }
        }

        DeliveryReport {
            total,
            succeeded,
            failed,
        }
    }

    /// A phase entry point fired with no job held (e.g. after a restart).
    /// Re-enter audience selection rather than erroring.
    async fn restart(
        &self,
        mut jobs: tokio::sync::MutexGuard<'_, HashMap<ChatId, BroadcastJob>>,
        operator: ChatId,
    ) -> Result<Reply> {
        jobs.insert(operator, BroadcastJob::new());
        drop(jobs);
        Ok(Reply::AudiencePrompt {
            total_participants: self.participants.count().await?,
        })
    }
}
