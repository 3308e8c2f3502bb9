/// Result type alias for Bot API calls.
pub type Result<T> = std::result::Result<T, BotApiError>;

#[derive(Debug, thiserror::Error)]
pub enum BotApiError {
    #[error("Bot API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
