use thiserror::Error;

/// Error taxonomy for the alert relay. A single cycle's failure is never
/// fatal to the process; the poll loop absorbs these and carries on.
#[derive(Debug, Clone, Error)]
pub enum BotError {
    /// Connection, timeout, or non-2xx failures talking to the feed or the
    /// Telegram API.
    #[error("Network Error: {0}")]
    Network(String),

    /// Non-empty feed body that is not valid JSON even after BOM-stripping.
    /// Carries the raw body so a diagnostic record can preserve it.
    #[error("Decode Error: {reason}")]
    Decode { reason: String, raw: String },

    /// Subscription store failures.
    #[error("Store Error: {0}")]
    Store(String),

    /// Telegram API answered but refused the call.
    #[error("Telegram API Error: {0}")]
    TelegramApi(String),

    /// A single outbound message could not be delivered.
    #[error("Delivery Error: user {user_id}: {reason}")]
    Delivery { user_id: i64, reason: String },

    /// Configuration errors; fatal at startup, never produced mid-run.
    #[error("Config Error: {0}")]
    Config(String),
}

impl BotError {
    /// Whether this failure should be captured as a diagnostic record in
    /// addition to being logged. Decode failures keep the raw response for
    /// later inspection; network blips do not.
    pub fn wants_diagnostic(&self) -> bool {
        matches!(self, BotError::Decode { .. })
    }

    /// The raw payload to include in a diagnostic record, if any.
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            BotError::Decode { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Short error kind tag used in diagnostic records.
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::Network(_) => "NetworkError",
            BotError::Decode { .. } => "DecodeError",
            BotError::Store(_) => "StoreError",
            BotError::TelegramApi(_) => "TelegramApiError",
            BotError::Delivery { .. } => "DeliveryError",
            BotError::Config(_) => "ConfigError",
        }
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Network(err.to_string())
    }
}

impl From<rusqlite::Error> for BotError {
    fn from(err: rusqlite::Error) -> Self {
        BotError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
