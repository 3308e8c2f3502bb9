use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Identity ---

/// Channel-assigned numeric identity. Participants and operators share the
/// same id space; role is decided by configuration, not by the id itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(raw: i64) -> Self {
        ChatId(raw)
    }
}

// --- Enumerated codes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LanguageCode {
    Eng,
    Ru,
    Bd,
    In,
    Pk,
    Ph,
    Lk,
    My,
    Th,
    Ng,
    Tr,
    Ke,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 12] = [
        LanguageCode::Eng,
        LanguageCode::Ru,
        LanguageCode::Bd,
        LanguageCode::In,
        LanguageCode::Pk,
        LanguageCode::Ph,
        LanguageCode::Lk,
        LanguageCode::My,
        LanguageCode::Th,
        LanguageCode::Ng,
        LanguageCode::Tr,
        LanguageCode::Ke,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            LanguageCode::Eng => "ENG",
            LanguageCode::Ru => "RU",
            LanguageCode::Bd => "BD",
            LanguageCode::In => "IN",
            LanguageCode::Pk => "PK",
            LanguageCode::Ph => "PH",
            LanguageCode::Lk => "LK",
            LanguageCode::My => "MY",
            LanguageCode::Th => "TH",
            LanguageCode::Ng => "NG",
            LanguageCode::Tr => "TR",
            LanguageCode::Ke => "KE",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LanguageCode::Eng => "English",
            LanguageCode::Ru => "Русский",
            LanguageCode::Bd => "বাংলা",
            LanguageCode::In => "हिंदी",
            LanguageCode::Pk => "اردو",
            LanguageCode::Ph => "Filipino",
            LanguageCode::Lk => "සිංහල",
            LanguageCode::My => "Bahasa Malaysia",
            LanguageCode::Th => "ไทย",
            LanguageCode::Ng => "English",
            LanguageCode::Tr => "Türkçe",
            LanguageCode::Ke => "English",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.code() == code)
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CountryCode {
    Eng,
    Ru,
    Bd,
    In,
    Pk,
    Ph,
    Lk,
    My,
    Th,
    Ng,
    Tr,
    Ke,
}

impl CountryCode {
    pub const ALL: [CountryCode; 12] = [
        CountryCode::Eng,
        CountryCode::Ru,
        CountryCode::Bd,
        CountryCode::In,
        CountryCode::Pk,
        CountryCode::Ph,
        CountryCode::Lk,
        CountryCode::My,
        CountryCode::Th,
        CountryCode::Ng,
        CountryCode::Tr,
        CountryCode::Ke,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            CountryCode::Eng => "ENG",
            CountryCode::Ru => "RU",
            CountryCode::Bd => "BD",
            CountryCode::In => "IN",
            CountryCode::Pk => "PK",
            CountryCode::Ph => "PH",
            CountryCode::Lk => "LK",
            CountryCode::My => "MY",
            CountryCode::Th => "TH",
            CountryCode::Ng => "NG",
            CountryCode::Tr => "TR",
            CountryCode::Ke => "KE",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CountryCode::Eng => "United Kingdom",
            CountryCode::Ru => "Russia",
            CountryCode::Bd => "Bangladesh",
            CountryCode::In => "India",
            CountryCode::Pk => "Pakistan",
            CountryCode::Ph => "Philippines",
            CountryCode::Lk => "Sri Lanka",
            CountryCode::My => "Malaysia",
            CountryCode::Th => "Thailand",
            CountryCode::Ng => "Nigeria",
            CountryCode::Tr => "Turkey",
            CountryCode::Ke => "Kenya",
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            CountryCode::Eng => "🇬🇧",
            CountryCode::Ru => "🇷🇺",
            CountryCode::Bd => "🇧🇩",
            CountryCode::In => "🇮🇳",
            CountryCode::Pk => "🇵🇰",
            CountryCode::Ph => "🇵🇭",
            CountryCode::Lk => "🇱🇰",
            CountryCode::My => "🇲🇾",
            CountryCode::Th => "🇹🇭",
            CountryCode::Ng => "🇳🇬",
            CountryCode::Tr => "🇹🇷",
            CountryCode::Ke => "🇰🇪",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }
}

impl std::fmt::Display for CountryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

// --- Participant ---

/// A fully registered end user. Created exactly once when the registration
/// flow completes; immutable afterwards except `last_active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ChatId,
    pub name: String,
    pub phone: String,
    pub language: LanguageCode,
    pub country: CountryCode,
    pub registered_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

// --- Registration session ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStep {
    AwaitingPhone,
    AwaitingLanguage,
    AwaitingCountry,
}

impl RegistrationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStep::AwaitingPhone => "awaiting_phone",
            RegistrationStep::AwaitingLanguage => "awaiting_language",
            RegistrationStep::AwaitingCountry => "awaiting_country",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "awaiting_phone" => Some(RegistrationStep::AwaitingPhone),
            "awaiting_language" => Some(RegistrationStep::AwaitingLanguage),
            "awaiting_country" => Some(RegistrationStep::AwaitingCountry),
            _ => None,
        }
    }
}

/// Fields accumulated across registration steps. Persisted as the session's
/// JSONB data blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialRegistration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<LanguageCode>,
}

/// Durable in-progress registration for one participant. Exactly one of
/// {session, participant} governs an identity at any time; when both exist
/// after a crash, the participant wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationSession {
    pub id: ChatId,
    pub step: RegistrationStep,
    pub data: PartialRegistration,
}

impl RegistrationSession {
    pub fn new(id: ChatId) -> Self {
        Self {
            id,
            step: RegistrationStep::AwaitingPhone,
            data: PartialRegistration::default(),
        }
    }
}

// --- Broadcast ---

/// Opaque message payload captured from an operator. Exactly one kind,
/// media kinds carry an optional caption. The core never looks inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePayload {
    Text {
        body: String,
    },
    Photo {
        file_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Document {
        file_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl MessagePayload {
    /// Truncated single-line preview for confirmation prompts. Media payloads
    /// preview as a fixed marker since their content is opaque.
    pub fn preview(&self, max_chars: usize) -> String {
        match self {
            MessagePayload::Text { body } => {
                if body.chars().count() <= max_chars {
                    body.clone()
                } else {
                    let head: String = body.chars().take(max_chars).collect();
                    format!("{head}…")
                }
            }
            MessagePayload::Photo { .. } => "📎 photo".to_string(),
            MessagePayload::Document { .. } => "📎 document".to_string(),
        }
    }
}

/// Audience selection for a broadcast job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum TargetSpec {
    All,
    Country { code: CountryCode },
    Participant { id: ChatId },
}

// --- Phone normalization ---

/// Canonicalize a channel-supplied phone number: trim surrounding whitespace
/// and guarantee a leading `+`.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('+') {
        trimmed.to_string()
    } else {
        format!("+{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_normalization_adds_leading_plus() {
        assert_eq!(normalize_phone("5551234"), "+5551234");
        assert_eq!(normalize_phone("+5551234"), "+5551234");
        assert_eq!(normalize_phone("  5551234 "), "+5551234");
    }

    #[test]
    fn codes_round_trip() {
        for lang in LanguageCode::ALL {
            assert_eq!(LanguageCode::from_code(lang.code()), Some(lang));
        }
        for country in CountryCode::ALL {
            assert_eq!(CountryCode::from_code(country.code()), Some(country));
        }
        assert_eq!(LanguageCode::from_code("XX"), None);
        assert_eq!(CountryCode::from_code("xx"), None);
    }

    #[test]
    fn payload_preview_truncates_text_only() {
        let long = MessagePayload::Text {
            body: "a".repeat(300),
        };
        assert_eq!(long.preview(200).chars().count(), 201);

        let photo = MessagePayload::Photo {
            file_ref: "abc".into(),
            caption: None,
        };
        assert_eq!(photo.preview(200), "📎 photo");
    }

    #[test]
    fn partial_registration_serializes_sparse() {
        let data = PartialRegistration {
            name: Some("Ana".into()),
            phone: Some("+5551234".into()),
            language: None,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Ana", "phone": "+5551234"})
        );
    }
}
