use std::env;

use crate::types::ChatId;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Channel transport
    pub bot_token: String,
    pub api_base_url: String,

    // Privileged identities allowed to broadcast
    pub operator_ids: Vec<ChatId>,

    // Postgres
    pub database_url: String,

    // Webhook server
    pub host: String,
    pub port: u16,
    pub public_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            bot_token: required_env("BOT_TOKEN"),
            api_base_url: env::var("BOT_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            operator_ids: parse_operator_ids(&env::var("OPERATOR_IDS").unwrap_or_default()),
            database_url: required_env("DATABASE_URL"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            public_url: env::var("PUBLIC_URL").ok(),
        }
    }

    pub fn is_operator(&self, id: ChatId) -> bool {
        self.operator_ids.contains(&id)
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

/// Comma-separated numeric ids. Entries that don't parse are skipped rather
/// than failing startup.
fn parse_operator_ids(raw: &str) -> Vec<ChatId> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .map(ChatId)
        .collect()
}
