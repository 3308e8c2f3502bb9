//! Reply rendering: typed engine replies become channel copy and keyboards.
//!
//! All user-facing text lives here, outside the core. Keyboards are built as
//! raw JSON the way the Bot API expects them.

use courier_common::{CountryCode, LanguageCode, Participant, TargetSpec};
use courier_engine::Reply;

/// Rendered outbound message: text plus an optional reply_markup blob.
pub struct Rendered {
    pub text: String,
    pub keyboard: Option<serde_json::Value>,
}

impl Rendered {
    fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    fn with_keyboard(text: impl Into<String>, keyboard: serde_json::Value) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

pub fn render(reply: &Reply) -> Rendered {
    match reply {
        // --- Registration ---
        Reply::AlreadyRegistered { name } => Rendered::text_only(format!(
            "👋 Welcome back, {name}! You are already registered."
        )),
        Reply::PhonePrompt { greeting_name } => Rendered::with_keyboard(
            format!(
                "👋 Hello {greeting_name}!\n\n\
                 To register, please share your phone number using the button below."
            ),
            contact_keyboard(),
        ),
        Reply::PhoneRejected => Rendered::with_keyboard(
            "⚠️ Please use the 'Share Contact' button to send your phone number.",
            contact_keyboard(),
        ),
        Reply::LanguagePrompt => Rendered::with_keyboard(
            "✅ Phone number received!\n\nPlease select your preferred language:",
            language_keyboard(),
        ),
        Reply::LanguageRejected => Rendered::with_keyboard(
            "⚠️ That language is not available. Please pick one from the list:",
            language_keyboard(),
        ),
        Reply::CountryPrompt { language } => Rendered::with_keyboard(
            format!(
                "✅ Language selected: {}\n\nNow select your country:",
                language.name()
            ),
            country_keyboard("country_"),
        ),
        Reply::CountryRejected => Rendered::with_keyboard(
            "⚠️ That country is not available. Please pick one from the list:",
            country_keyboard("country_"),
        ),
        Reply::RegistrationComplete { participant } => {
            Rendered::text_only(registration_summary(participant))
        }
        Reply::SessionMissing => {
            Rendered::text_only("Your registration has expired. Please send /start to begin again.")
        }
        Reply::RegistrationCancelled => {
            Rendered::text_only("Registration cancelled. Use /start to begin again.")
        }

        // --- Broadcast ---
        Reply::Denied => Rendered::text_only("⛔ You are not authorized."),
        Reply::AudiencePrompt { total_participants } => Rendered::with_keyboard(
            format!(
                "📢 BROADCAST\n\nRegistered participants: {total_participants}\n\nSelect the audience:"
            ),
            audience_keyboard(),
        ),
        Reply::RecipientPrompt => {
            Rendered::text_only("👤 Send the participant ID you want to message:")
        }
        Reply::RecipientRejected => {
            Rendered::text_only("⚠️ Please enter a valid participant ID (numbers only).")
        }
        Reply::UnknownRecipient { id } => Rendered::text_only(format!(
            "⚠️ No participant with ID {id}. Send another ID or /cancel."
        )),
        Reply::MessagePrompt { target } => Rendered::text_only(format!(
            "📢 Broadcast to {}.\n\n\
             Send your message now (text, photo, or document).\nType /cancel to abort.",
            describe_target(target)
        )),
        Reply::NoRecipients => {
            Rendered::text_only("❌ No recipients match that audience. Broadcast discarded.")
        }
        Reply::ConfirmPrompt {
            target,
            preview,
            audience_size,
        } => Rendered::with_keyboard(
            format!(
                "⚠️ CONFIRM BROADCAST\n\n\
                 Audience: {} ({audience_size} recipients)\n\n\
                 Preview:\n{preview}\n\n\
                 This cannot be undone once sending starts.",
                describe_target(target)
            ),
            confirm_keyboard(),
        ),
        Reply::ConfirmationPending => {
            Rendered::text_only("Please confirm or cancel the pending broadcast first.")
        }
        Reply::BroadcastCancelled => Rendered::text_only("❌ Broadcast cancelled."),
        Reply::BroadcastReport { target, report } => Rendered::text_only(format!(
            "✅ BROADCAST COMPLETE\n\n\
             Audience: {}\n\
             • Total recipients: {}\n\
             • Delivered: {}\n\
             • Failed: {}\n\
             • Success rate: {:.1}%",
            describe_target(target),
            report.total,
            report.succeeded,
            report.failed,
            report.success_rate()
        )),
    }
}

/// Notice sent to each operator when a registration completes.
pub fn render_registration_notice(participant: &Participant) -> String {
    format!(
        "🆕 NEW PARTICIPANT REGISTERED\n\n\
         • Name: {}\n\
         • Phone: {}\n\
         • Country: {} {}\n\
         • Language: {}\n\
         • ID: {}\n\
         • Time: {}",
        participant.name,
        participant.phone,
        participant.country.flag(),
        participant.country.name(),
        participant.language.name(),
        participant.id,
        participant.registered_at.format("%Y-%m-%d %H:%M:%S")
    )
}

pub fn render_progress(progress: &courier_engine::DeliveryProgress) -> String {
    let percentage = progress.processed as f64 / progress.total as f64 * 100.0;
    format!(
        "📤 Broadcasting…\n{}/{} ({percentage:.1}%)\n✅ {} delivered\n❌ {} failed",
        progress.processed, progress.total, progress.succeeded, progress.failed
    )
}

fn registration_summary(participant: &Participant) -> String {
    format!(
        "🎉 REGISTRATION SUCCESSFUL!\n\n\
         • Name: {}\n\
         • Country: {} {}\n\
         • Language: {}\n\n\
         You will now receive our announcements here.",
        participant.name,
        participant.country.flag(),
        participant.country.name(),
        participant.language.name()
    )
}

fn describe_target(target: &TargetSpec) -> String {
    match target {
        TargetSpec::All => "all participants".to_string(),
        TargetSpec::Country { code } => format!("{} {}", code.flag(), code.name()),
        TargetSpec::Participant { id } => format!("participant {id}"),
    }
}

// --- Keyboards ---

/// Reply keyboard with the structured contact-request button.
fn contact_keyboard() -> serde_json::Value {
    serde_json::json!({
        "keyboard": [[{ "text": "📞 Share Contact", "request_contact": true }]],
        "resize_keyboard": true,
        "one_time_keyboard": true
    })
}

fn language_keyboard() -> serde_json::Value {
    let rows: Vec<serde_json::Value> = LanguageCode::ALL
        .iter()
        .map(|lang| {
            serde_json::json!([{
                "text": lang.name(),
                "callback_data": format!("lang_{}", lang.code())
            }])
        })
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

fn country_keyboard(prefix: &str) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = CountryCode::ALL
        .iter()
        .map(|country| {
            serde_json::json!([{
                "text": format!("{} {}", country.flag(), country.name()),
                "callback_data": format!("{prefix}{}", country.code())
            }])
        })
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

fn audience_keyboard() -> serde_json::Value {
    serde_json::json!({
        "inline_keyboard": [
            [{ "text": "🌍 All participants", "callback_data": "target_all" }],
            [{ "text": "🗺 One country", "callback_data": "target_country_menu" }],
            [{ "text": "👤 One participant", "callback_data": "target_user" }],
            [{ "text": "📊 Statistics", "callback_data": "op_stats" }],
            [{ "text": "🕒 Recent registrations", "callback_data": "op_recent" }]
        ]
    })
}

/// Country picker for broadcast targeting (distinct prefix from the
/// registration picker).
pub fn broadcast_country_keyboard() -> serde_json::Value {
    country_keyboard("target_country_")
}

fn confirm_keyboard() -> serde_json::Value {
    serde_json::json!({
        "inline_keyboard": [
            [{ "text": "✅ YES, SEND NOW", "callback_data": "confirm_broadcast" }],
            [{ "text": "❌ CANCEL", "callback_data": "cancel_broadcast" }]
        ]
    })
}
