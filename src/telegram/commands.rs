//! Command handling over long-polled updates.
//!
//! Commands are plain `/name args` text messages. Privileged operations
//! check `is_admin` up front; the dev-mode test-alert injection is a
//! two-step conversation tracked in an explicit per-user state map.

use crate::alerts::model::Alert;
use crate::alerts::monitor::AlertPipeline;
use crate::error::Result;
use crate::storage::SubscriptionStore;
use crate::telegram::{Message, Messenger, TelegramClient};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const HELP_TEXT: &str = "Available commands:\n\
    /subscribe <location> - Subscribe to alerts for a location\n\
    /unsubscribe <location> - Unsubscribe from a location\n\
    /list - List your current subscriptions\n\
    /help - Show this help message\n";

const ADMIN_HELP_TEXT: &str = "Available commands:\n\
    /subscribe <location> - Subscribe to alerts for a location\n\
    /unsubscribe <location> - Unsubscribe from a location\n\
    /list - List your current subscriptions\n\
    /get_users - Get all users\n\
    /get_subscriptions - Get all subscriptions\n\
    /help - Show this help message\n\
    /test_alert - Test alert message, send the alert JSON in the next message\n";

const NOT_AUTHORIZED_TEXT: &str = "You are not authorized to use this command.";

/// In-flight multi-step conversation state, one slot per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingFlow {
    /// `/test_alert` was issued; the next message carries the alert JSON.
    AwaitingAlertPayload,
}

pub struct CommandRouter {
    client: Arc<TelegramClient>,
    store: Arc<dyn SubscriptionStore>,
    pipeline: Arc<AlertPipeline>,
    dev_mode: bool,
    poll_timeout_secs: u64,
    pending: Mutex<HashMap<i64, PendingFlow>>,
}

impl CommandRouter {
    pub fn new(
        client: Arc<TelegramClient>,
        store: Arc<dyn SubscriptionStore>,
        pipeline: Arc<AlertPipeline>,
        dev_mode: bool,
        poll_timeout_secs: u64,
    ) -> Self {
        Self {
            client,
            store,
            pipeline,
            dev_mode,
            poll_timeout_secs,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Long-poll loop. Never returns; a failed poll backs off briefly and
    /// tries again.
    pub async fn run(&self) {
        info!("Command router running (dev_mode: {})", self.dev_mode);
        let mut offset = 0_i64;
        loop {
            match self.client.get_updates(offset, self.poll_timeout_secs).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(message) = update.message {
                            if let Err(err) = self.handle_message(&message).await {
                                error!("Error handling message from {}: {}", message.chat.id, err);
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!("Failed to poll for updates: {}", err);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        let user_id = message.chat.id;
        let text = match message.text.as_deref() {
            Some(text) => text.trim(),
            None => return Ok(()),
        };

        if !text.starts_with('/') {
            let flow = self.pending.lock().await.get(&user_id).copied();
            if flow == Some(PendingFlow::AwaitingAlertPayload) {
                return self.finish_test_alert(user_id, text).await;
            }
            return Ok(());
        }

        let (command, args) = split_command(text);
        match command {
            "/start" | "/help" => self.send_help(user_id).await,
            "/subscribe" => self.subscribe(user_id, args).await,
            "/unsubscribe" => self.unsubscribe(user_id, args).await,
            "/list" => self.list_subscriptions(user_id).await,
            "/get_users" => self.get_users(user_id).await,
            "/get_subscriptions" => self.get_subscriptions(user_id).await,
            "/test_alert" if self.dev_mode => self.start_test_alert(user_id).await,
            "/cancel" => self.cancel(user_id).await,
            _ => Ok(()),
        }
    }

    /// Replies with a refusal and returns false unless the user is on the
    /// admin roster.
    async fn ensure_admin(&self, user_id: i64) -> Result<bool> {
        if self.store.is_admin(user_id)? {
            return Ok(true);
        }
        self.client.send_message(user_id, NOT_AUTHORIZED_TEXT).await?;
        Ok(false)
    }

    async fn send_help(&self, user_id: i64) -> Result<()> {
        let help = if self.store.is_admin(user_id)? {
            ADMIN_HELP_TEXT
        } else {
            HELP_TEXT
        };
        self.client.send_message(user_id, help).await
    }

    async fn subscribe(&self, user_id: i64, args: &str) -> Result<()> {
        if args.is_empty() {
            return self
                .client
                .send_message(user_id, "Please provide a location to subscribe to.")
                .await;
        }
        let location = args.to_lowercase();
        let reply = if self.store.add_subscription(user_id, &location)? {
            info!("User {} subscribed to alerts for: {}", user_id, location);
            format!("Subscribed to alerts for: {}", location)
        } else {
            format!("You are already subscribed to alerts for: {}", location)
        };
        self.client.send_message(user_id, &reply).await
    }

    async fn unsubscribe(&self, user_id: i64, args: &str) -> Result<()> {
        if args.is_empty() {
            return self
                .client
                .send_message(user_id, "Please provide a location to unsubscribe from.")
                .await;
        }
        let location = args.to_lowercase();
        let reply = if self.store.remove_subscription(user_id, &location)? {
            info!("User {} unsubscribed from alerts for: {}", user_id, location);
            format!("Unsubscribed from alerts for: {}", location)
        } else {
            format!("You were not subscribed to alerts for: {}", location)
        };
        self.client.send_message(user_id, &reply).await
    }

    async fn list_subscriptions(&self, user_id: i64) -> Result<()> {
        let locations = self.store.user_subscriptions(user_id)?;
        let reply = render_subscription_list(&locations);
        self.client.send_message(user_id, &reply).await
    }

    async fn get_users(&self, user_id: i64) -> Result<()> {
        if !self.ensure_admin(user_id).await? {
            return Ok(());
        }
        info!("User {} requested all users", user_id);
        let users = self.store.all_users()?;
        let reply = format!(
            "All users:\n{}",
            users
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        );
        self.client.send_message(user_id, &reply).await
    }

    async fn get_subscriptions(&self, user_id: i64) -> Result<()> {
        if !self.ensure_admin(user_id).await? {
            return Ok(());
        }
        info!("User {} requested all subscriptions", user_id);
        let subscriptions = self.store.all_subscriptions()?;
        let reply = format!("All subscriptions:\n{}", render_all_subscriptions(&subscriptions));
        self.client.send_message(user_id, &reply).await
    }

    async fn start_test_alert(&self, user_id: i64) -> Result<()> {
        if !self.ensure_admin(user_id).await? {
            return Ok(());
        }
        self.pending
            .lock()
            .await
            .insert(user_id, PendingFlow::AwaitingAlertPayload);
        self.client
            .send_message(
                user_id,
                "**IMPORTANT**\n\nThis will trigger alerts to all users. \
                 If you are not sure, please cancel.",
            )
            .await
    }

    async fn finish_test_alert(&self, user_id: i64, payload: &str) -> Result<()> {
        self.pending.lock().await.remove(&user_id);
        if !self.ensure_admin(user_id).await? {
            return Ok(());
        }
        let alert: Alert = match serde_json::from_str(payload.trim_start_matches('\u{feff}')) {
            Ok(alert) => alert,
            Err(err) => {
                return self
                    .client
                    .send_message(user_id, &format!("Could not decode alert payload: {}", err))
                    .await;
            }
        };
        self.client
            .send_message(user_id, "Alert message received and decoded successfully.")
            .await?;
        warn!("User {} injected test alert {}", user_id, alert.id);
        self.pipeline.publish(&alert).await?;
        Ok(())
    }

    async fn cancel(&self, user_id: i64) -> Result<()> {
        if self.pending.lock().await.remove(&user_id).is_none() {
            return Ok(());
        }
        self.client
            .send_message(
                user_id,
                "Alert conversation cancelled.\n\nNo alert was triggered.",
            )
            .await
    }
}

/// Splits `/command arg words` into the command (with any `@botname`
/// mention dropped) and the trimmed argument tail.
fn split_command(text: &str) -> (&str, &str) {
    let (command, args) = match text.split_once(char::is_whitespace) {
        Some((command, args)) => (command, args.trim()),
        None => (text, ""),
    };
    let command = command.split('@').next().unwrap_or(command);
    (command, args)
}

fn render_subscription_list(locations: &std::collections::HashSet<String>) -> String {
    if locations.is_empty() {
        return "You have no active subscriptions.".to_string();
    }
    let mut sorted: Vec<_> = locations.iter().cloned().collect();
    sorted.sort();
    let lines: Vec<String> = sorted.iter().map(|loc| format!("- {}", loc)).collect();
    format!("Your current subscriptions:\n{}", lines.join("\n"))
}

fn render_all_subscriptions(
    subscriptions: &HashMap<i64, std::collections::HashSet<String>>,
) -> String {
    let mut user_ids: Vec<_> = subscriptions.keys().copied().collect();
    user_ids.sort_unstable();
    user_ids
        .iter()
        .map(|user_id| {
            let mut locations: Vec<_> = subscriptions[user_id].iter().cloned().collect();
            locations.sort();
            format!("{}: {}", user_id, locations.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
