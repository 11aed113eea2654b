use crate::error::{BotError, Result};
use std::env;
use std::fmt;

pub const DEFAULT_FEED_URL: &str = "https://www.oref.org.il/WarningMessages/alert/alerts.json";
pub const DEFAULT_ORIGIN_URL: &str = "https://www.oref.org.il/";

#[derive(Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub superuser_id: i64,
    pub alert_check_interval_secs: u64,
    pub dedup_window_secs: u64,
    pub sqlite_db_path: String,
    pub debug_folder: String,
    pub alert_feed_url: String,
    pub alert_origin_url: String,
    pub http_timeout_secs: u64,
    pub update_poll_timeout_secs: u64,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            superuser_id: env::var("SUPERUSER_ID")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),
            alert_check_interval_secs: env::var("ALERT_CHECK_INTERVAL_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            dedup_window_secs: env::var("DEDUP_WINDOW_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            sqlite_db_path: env::var("SQLITE_DB_PATH")
                .unwrap_or_else(|_| "data/subscriptions.db".to_string()),
            debug_folder: env::var("DEBUG_FOLDER").unwrap_or_else(|_| "debug".to_string()),
            alert_feed_url: env::var("ALERT_FEED_URL")
                .unwrap_or_else(|_| DEFAULT_FEED_URL.to_string()),
            alert_origin_url: env::var("ALERT_ORIGIN_URL")
                .unwrap_or_else(|_| DEFAULT_ORIGIN_URL.to_string()),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            update_poll_timeout_secs: env::var("UPDATE_POLL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            dev_mode: env::var("DEV_MODE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram_bot_token.trim().is_empty() {
            return Err(BotError::Config("TELEGRAM_BOT_TOKEN cannot be empty".to_string()));
        }
        if self.superuser_id == 0 {
            return Err(BotError::Config("SUPERUSER_ID must be set".to_string()));
        }
        if self.alert_check_interval_secs == 0 {
            return Err(BotError::Config(
                "ALERT_CHECK_INTERVAL_SECS must be positive".to_string(),
            ));
        }
        if self.dedup_window_secs == 0 {
            return Err(BotError::Config("DEDUP_WINDOW_SECS must be positive".to_string()));
        }
        log::info!("Application configuration loaded: {:?}", self);
        Ok(())
    }
}

// Manual Debug so the bot token never lands in a log line.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("superuser_id", &self.superuser_id)
            .field("alert_check_interval_secs", &self.alert_check_interval_secs)
            .field("dedup_window_secs", &self.dedup_window_secs)
            .field("sqlite_db_path", &self.sqlite_db_path)
            .field("debug_folder", &self.debug_folder)
            .field("alert_feed_url", &self.alert_feed_url)
            .field("alert_origin_url", &self.alert_origin_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("update_poll_timeout_secs", &self.update_poll_timeout_secs)
            .field("dev_mode", &self.dev_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            telegram_bot_token: "123456:secret-token".to_string(),
            superuser_id: 7,
            alert_check_interval_secs: 10,
            dedup_window_secs: 60,
            sqlite_db_path: "data/subscriptions.db".to_string(),
            debug_folder: "debug".to_string(),
            alert_feed_url: DEFAULT_FEED_URL.to_string(),
            alert_origin_url: DEFAULT_ORIGIN_URL.to_string(),
            http_timeout_secs: 10,
            update_poll_timeout_secs: 30,
            dev_mode: false,
        }
    }

    #[test]
    fn debug_output_redacts_the_token() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn validate_rejects_missing_essentials() {
        let mut bad = config();
        bad.telegram_bot_token = "  ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.superuser_id = 0;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.alert_check_interval_secs = 0;
        assert!(bad.validate().is_err());

        assert!(config().validate().is_ok());
    }
}
