//! Typed replies returned by the state machines.
//!
//! The core never renders copy. Every accepted or rejected input maps to a
//! variant specific enough for the dispatcher to tell the user exactly what
//! was expected; how that becomes channel text and keyboards is the
//! gateway's business.

use courier_common::{ChatId, LanguageCode, Participant, TargetSpec};

use crate::report::DeliveryReport;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    // --- Registration ---
    /// First contact from an identity that already has a participant record.
    AlreadyRegistered { name: String },
    /// New session created; ask for the shared-contact credential.
    PhonePrompt { greeting_name: String },
    /// Input at AwaitingPhone was not a contact credential.
    PhoneRejected,
    /// Phone accepted; ask for a language code.
    LanguagePrompt,
    /// Code outside the language set; step unchanged.
    LanguageRejected,
    /// Language accepted; ask for a country code.
    CountryPrompt { language: LanguageCode },
    /// Code outside the country set; step unchanged.
    CountryRejected,
    /// Participant committed, session retired, operators notified.
    RegistrationComplete { participant: Participant },
    /// Step input arrived with no backing session; ask the user to restart.
    SessionMissing,
    /// Session deleted on explicit cancel.
    RegistrationCancelled,

    // --- Broadcast ---
    /// Identity outside the privileged set touched a broadcast entry point.
    Denied,
    /// Fresh job created; ask for an audience.
    AudiencePrompt { total_participants: i64 },
    /// Single-recipient target chosen; ask for the recipient id.
    RecipientPrompt,
    /// Recipient id input did not parse as a numeric id.
    RecipientRejected,
    /// No participant exists under the given id; still selecting.
    UnknownRecipient { id: ChatId },
    /// Audience fixed; ask for the message payload.
    MessagePrompt { target: TargetSpec },
    /// Resolved audience was empty; job discarded.
    NoRecipients,
    /// Payload captured; show preview + audience size, ask confirm/cancel.
    ConfirmPrompt {
        target: TargetSpec,
        preview: String,
        audience_size: usize,
    },
    /// Input at AwaitingConfirmation that is neither confirm nor cancel.
    /// Job and payload untouched.
    ConfirmationPending,
    /// Job discarded before sending.
    BroadcastCancelled,
    /// Delivery loop ran to completion.
    BroadcastReport {
        target: TargetSpec,
        report: DeliveryReport,
    },
}
