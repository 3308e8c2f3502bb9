//! Channel-transport implementations of the engine's outbound seams.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use botapi_client::BotApiClient;
use courier_common::{ChatId, MessagePayload, Participant};
use courier_engine::traits::{BroadcastMonitor, MessageSender, OperatorNotifier, SendFailure};
use courier_engine::DeliveryProgress;

use crate::render;

/// Sends engine output over the Bot API. One instance is shared by both
/// state machines.
pub struct ChannelSender {
    bot: Arc<BotApiClient>,
}

impl ChannelSender {
    pub fn new(bot: Arc<BotApiClient>) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessageSender for ChannelSender {
    async fn send(&self, recipient: ChatId, payload: &MessagePayload) -> Result<(), SendFailure> {
        let result = match payload {
            MessagePayload::Text { body } => {
                self.bot.send_message(recipient.0, body, None).await
            }
            MessagePayload::Photo { file_ref, caption } => {
                self.bot
                    .send_photo(recipient.0, file_ref, caption.as_deref())
                    .await
            }
            MessagePayload::Document { file_ref, caption } => {
                self.bot
                    .send_document(recipient.0, file_ref, caption.as_deref())
                    .await
            }
        };

        result.map_err(|e| SendFailure::new(e.to_string()))
    }
}

#[async_trait]
impl OperatorNotifier for ChannelSender {
    async fn notify(&self, operator: ChatId, participant: &Participant) -> Result<(), SendFailure> {
        let text = render::render_registration_notice(participant);
        self.bot
            .send_message(operator.0, &text, None)
            .await
            .map_err(|e| SendFailure::new(e.to_string()))
    }
}

#[async_trait]
impl BroadcastMonitor for ChannelSender {
    async fn on_progress(&self, operator: ChatId, progress: &DeliveryProgress) {
        let text = render::render_progress(progress);
        // Progress updates are best-effort; a failed one must not disturb
        // the delivery loop.
        if let Err(e) = self.bot.send_message(operator.0, &text, None).await {
            warn!(operator = %operator, error = %e, "Failed to send progress update");
        }
    }
}
