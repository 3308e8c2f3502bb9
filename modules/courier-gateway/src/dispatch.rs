//! The dispatcher: routes decoded inbound events to the two state machines
//! by sender role and event kind, renders the typed replies, and sends them
//! back over the channel.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use botapi_client::BotApiClient;
use courier_common::{ChatId, Config, CountryCode, TargetSpec};
use courier_engine::{Broadcaster, RegistrationFlow, Reply};
use courier_store::{ParticipantStore, SessionStore};

use crate::render;
use crate::sender::ChannelSender;
use crate::update::{self, CallbackAction, Command, Inbound, Update};

pub struct AppState {
    pub config: Config,
    pub bot: Arc<BotApiClient>,
    pub participants: ParticipantStore,
    pub sessions: SessionStore,
    pub registration: RegistrationFlow<ParticipantStore, SessionStore, Arc<ChannelSender>>,
    pub broadcaster: Broadcaster<ParticipantStore, Arc<ChannelSender>, Arc<ChannelSender>>,
    /// Per-identity serialization: no two events for the same participant
    /// or operator are ever processed concurrently. Events for different
    /// identities proceed independently.
    pub identity_locks: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl AppState {
    async fn identity_lock(&self, chat: ChatId) -> Arc<Mutex<()>> {
        self.identity_locks
            .lock()
            .await
            .entry(chat)
            .or_default()
            .clone()
    }

    fn is_operator(&self, id: ChatId) -> bool {
        self.config.is_operator(id)
    }

    async fn send_reply(&self, chat: ChatId, reply: &Reply) -> Result<()> {
        let rendered = render::render(reply);
        self.bot
            .send_message(chat.0, &rendered.text, rendered.keyboard)
            .await?;
        Ok(())
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()> {
        self.bot.send_message(chat.0, text, None).await?;
        Ok(())
    }

    /// Any authenticated interaction refreshes last_active.
    async fn touch(&self, chat: ChatId) {
        if let Err(e) = self.participants.touch_last_active(chat).await {
            warn!(chat_id = %chat, error = %e, "Failed to refresh last_active");
        }
    }
}

pub async fn handle_update(state: &AppState, update: Update) -> Result<()> {
    let Some(event) = update::decode(update) else {
        return Ok(());
    };

    let chat = match &event {
        Inbound::Command { chat, .. }
        | Inbound::ContactShared { chat, .. }
        | Inbound::Callback { chat, .. }
        | Inbound::Content { chat, .. } => *chat,
    };
    let lock = state.identity_lock(chat).await;
    let _guard = lock.lock().await;

    match event {
        Inbound::Command {
            chat,
            command,
            display_name,
        } => handle_command(state, chat, command, &display_name).await,
        Inbound::ContactShared { chat, phone, name } => {
            let reply = state.registration.on_contact_credential(chat, &phone, &name).await?;
            state.send_reply(chat, &reply).await
        }
        Inbound::Callback {
            chat,
            callback_id,
            action,
        } => {
            // Acknowledge first so the client stops spinning; best-effort.
            if let Err(e) = state.bot.answer_callback_query(&callback_id).await {
                debug!(error = %e, "Failed to answer callback query");
            }
            handle_callback(state, chat, action).await
        }
        Inbound::Content { chat, payload } => {
            if state.is_operator(chat) {
                // Operator free-form input belongs to the broadcast flow
                // only while a job is active.
                match state.broadcaster.on_operator_message(chat, payload).await? {
                    Some(reply) => state.send_reply(chat, &reply).await,
                    None => Ok(()),
                }
            } else if state.participants.get(chat).await?.is_some() {
                state.touch(chat).await;
                Ok(())
            } else if state.sessions.get(chat).await?.is_some() {
                // Mid-registration input of the wrong shape: re-prompt the
                // current step.
                let reply = state.registration.on_unexpected_input(chat).await?;
                state.send_reply(chat, &reply).await
            } else {
                // Unsolicited content from an unknown identity.
                Ok(())
            }
        }
    }
}

async fn handle_command(
    state: &AppState,
    chat: ChatId,
    command: Command,
    display_name: &str,
) -> Result<()> {
    match command {
        Command::Start => {
            if state.is_operator(chat) {
                return state
                    .send_text(
                        chat,
                        &format!(
                            "👑 Welcome, {display_name}!\nUse /broadcast to message participants."
                        ),
                    )
                    .await;
            }
            let reply = state.registration.on_first_contact(chat, display_name).await?;
            if matches!(reply, Reply::AlreadyRegistered { .. }) {
                state.touch(chat).await;
            }
            state.send_reply(chat, &reply).await
        }
        Command::Cancel => {
            // Dual-purpose by role: operators cancel their broadcast job,
            // participants cancel their registration session.
            let reply = if state.is_operator(chat) {
                state.broadcaster.on_cancel(chat).await?
            } else {
                state.touch(chat).await;
                state.registration.on_cancel(chat).await?
            };
            state.send_reply(chat, &reply).await
        }
        Command::Broadcast => {
            let reply = state.broadcaster.on_operator_command(chat).await?;
            state.send_reply(chat, &reply).await
        }
    }
}

async fn handle_callback(state: &AppState, chat: ChatId, action: CallbackAction) -> Result<()> {
    match action {
        CallbackAction::Language(code) => {
            let reply = state.registration.on_language_choice(chat, &code).await?;
            state.send_reply(chat, &reply).await
        }
        CallbackAction::Country(code) => {
            let reply = state.registration.on_country_choice(chat, &code).await?;
            state.send_reply(chat, &reply).await
        }
        CallbackAction::TargetAll => {
            let reply = state
                .broadcaster
                .on_audience_selected(chat, TargetSpec::All)
                .await?;
            state.send_reply(chat, &reply).await
        }
        CallbackAction::TargetCountryMenu => {
            if !state.is_operator(chat) {
                return state.send_reply(chat, &Reply::Denied).await;
            }
            let keyboard = render::broadcast_country_keyboard();
            send_with_keyboard(state, chat, "🗺 Select the country to broadcast to:", keyboard)
                .await
        }
        CallbackAction::TargetCountry(code) => match CountryCode::from_code(&code) {
            Some(code) => {
                let reply = state
                    .broadcaster
                    .on_audience_selected(chat, TargetSpec::Country { code })
                    .await?;
                state.send_reply(chat, &reply).await
            }
            None => {
                // Keyboard-generated data should never carry unknown codes.
                debug!(code = %code, "Ignoring unknown broadcast country code");
                Ok(())
            }
        },
        CallbackAction::TargetSingle => {
            let reply = state.broadcaster.on_recipient_requested(chat).await?;
            state.send_reply(chat, &reply).await
        }
        CallbackAction::ConfirmBroadcast => {
            let reply = state.broadcaster.on_confirm(chat).await?;
            state.send_reply(chat, &reply).await
        }
        CallbackAction::CancelBroadcast => {
            let reply = state.broadcaster.on_cancel(chat).await?;
            state.send_reply(chat, &reply).await
        }
        CallbackAction::Stats => {
            if !state.is_operator(chat) {
                return state.send_reply(chat, &Reply::Denied).await;
            }
            let text = crate::panels::stats_panel(&state.participants).await?;
            state.send_text(chat, &text).await
        }
        CallbackAction::Recent => {
            if !state.is_operator(chat) {
                return state.send_reply(chat, &Reply::Denied).await;
            }
            let text = crate::panels::recent_panel(&state.participants).await?;
            state.send_text(chat, &text).await
        }
        CallbackAction::Unknown(data) => {
            debug!(data = %data, "Ignoring unknown callback data");
            Ok(())
        }
    }
}

async fn send_with_keyboard(
    state: &AppState,
    chat: ChatId,
    text: &str,
    keyboard: serde_json::Value,
) -> Result<()> {
    state.bot.send_message(chat.0, text, Some(keyboard)).await?;
    Ok(())
}
