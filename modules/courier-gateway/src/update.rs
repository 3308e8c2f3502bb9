//! Inbound channel updates, decoded once at the boundary.
//!
//! The wire structs mirror the Bot API update shape; `decode` turns one into
//! a typed `Inbound` event so the dispatcher never touches raw JSON or
//! callback-data strings again.

use serde::Deserialize;

use courier_common::{ChatId, MessagePayload};

// --- Wire shape ---

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    pub first_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct Document {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub data: Option<String>,
}

// --- Typed events ---

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Command {
        chat: ChatId,
        command: Command,
        display_name: String,
    },
    ContactShared {
        chat: ChatId,
        phone: String,
        name: String,
    },
    Callback {
        chat: ChatId,
        callback_id: String,
        action: CallbackAction,
    },
    /// Non-command message content: free text or media.
    Content {
        chat: ChatId,
        payload: MessagePayload,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Cancel,
    Broadcast,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackAction {
    /// Raw code; the registration machine validates it against the set.
    Language(String),
    Country(String),
    TargetAll,
    /// Show the country picker for broadcast targeting.
    TargetCountryMenu,
    TargetCountry(String),
    TargetSingle,
    ConfirmBroadcast,
    CancelBroadcast,
    Stats,
    Recent,
    Unknown(String),
}

/// Decode one update into a typed event. Returns `None` for update kinds we
/// don't handle (edits, channel posts, empty messages).
pub fn decode(update: Update) -> Option<Inbound> {
    if let Some(query) = update.callback_query {
        let data = query.data.unwrap_or_default();
        return Some(Inbound::Callback {
            chat: ChatId(query.from.id),
            callback_id: query.id,
            action: decode_callback(&data),
        });
    }

    let message = update.message?;
    let chat = ChatId(message.chat.id);
    let display_name = message
        .from
        .as_ref()
        .map(User::display_name)
        .unwrap_or_default();

    if let Some(contact) = message.contact {
        return Some(Inbound::ContactShared {
            chat,
            phone: contact.phone_number,
            name: contact.first_name,
        });
    }

    if let Some(text) = &message.text {
        let trimmed = text.trim();
        let command = match trimmed {
            "/start" => Some(Command::Start),
            "/cancel" => Some(Command::Cancel),
            "/broadcast" => Some(Command::Broadcast),
            _ => None,
        };
        if let Some(command) = command {
            return Some(Inbound::Command {
                chat,
                command,
                display_name,
            });
        }
        return Some(Inbound::Content {
            chat,
            payload: MessagePayload::Text {
                body: text.clone(),
            },
        });
    }

    // Largest rendition of the photo, as the original channel sends them
    // smallest-first.
    if let Some(photo) = message.photo {
        if let Some(size) = photo.last() {
            return Some(Inbound::Content {
                chat,
                payload: MessagePayload::Photo {
                    file_ref: size.file_id.clone(),
                    caption: message.caption,
                },
            });
        }
    }

    if let Some(document) = message.document {
        return Some(Inbound::Content {
            chat,
            payload: MessagePayload::Document {
                file_ref: document.file_id,
                caption: message.caption,
            },
        });
    }

    None
}

fn decode_callback(data: &str) -> CallbackAction {
    if let Some(code) = data.strip_prefix("lang_") {
        return CallbackAction::Language(code.to_string());
    }
    if let Some(code) = data.strip_prefix("country_") {
        return CallbackAction::Country(code.to_string());
    }
    if data == "target_country_menu" {
        return CallbackAction::TargetCountryMenu;
    }
    if let Some(code) = data.strip_prefix("target_country_") {
        return CallbackAction::TargetCountry(code.to_string());
    }
    match data {
        "target_all" => CallbackAction::TargetAll,
        "target_user" => CallbackAction::TargetSingle,
        "confirm_broadcast" => CallbackAction::ConfirmBroadcast,
        "cancel_broadcast" => CallbackAction::CancelBroadcast,
        "op_stats" => CallbackAction::Stats,
        "op_recent" => CallbackAction::Recent,
        other => CallbackAction::Unknown(other.to_string()),
    }
}
