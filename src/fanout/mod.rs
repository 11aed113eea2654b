//! Subscriber matching and message fan-out.

use crate::alerts::model::Alert;
use crate::error::Result;
use crate::storage::SubscriptionStore;
use crate::telegram::Messenger;
use log::{error, info};
use std::collections::HashSet;
use std::sync::Arc;

/// Filter value that matches every alert regardless of location.
pub const WILDCARD_FILTER: &str = "all";

pub struct SubscriptionFanout {
    store: Arc<dyn SubscriptionStore>,
    messenger: Arc<dyn Messenger>,
}

impl SubscriptionFanout {
    pub fn new(store: Arc<dyn SubscriptionStore>, messenger: Arc<dyn Messenger>) -> Self {
        Self { store, messenger }
    }

    /// Delivers one message per subscriber whose filters match any of
    /// `fresh_locations`. Returns the number of successful deliveries.
    ///
    /// A failed delivery is logged and never blocks the remaining
    /// subscribers. With an empty location list the subscription store is
    /// not even read.
    pub async fn publish(&self, alert: &Alert, fresh_locations: &[String]) -> Result<usize> {
        if fresh_locations.is_empty() {
            return Ok(0);
        }
        let subscriptions = self.store.all_subscriptions()?;
        let mut delivered = 0;
        for (user_id, filters) in subscriptions {
            let matched = matched_locations(&filters, fresh_locations);
            if matched.is_empty() {
                continue;
            }
            let message = compose_alert_message(alert, &matched);
            match self.messenger.send_message(user_id, &message).await {
                Ok(()) => delivered += 1,
                Err(err) => error!("Failed to send message to user {}: {}", user_id, err),
            }
        }
        info!(
            "Alert {}: delivered to {} subscriber(s)",
            alert.id, delivered
        );
        Ok(delivered)
    }
}

/// The subset of `fresh` this subscriber should be told about: everything
/// for a wildcard subscription, otherwise the locations with at least one
/// filter as a case-insensitive substring.
fn matched_locations(filters: &HashSet<String>, fresh: &[String]) -> Vec<String> {
    if filters.contains(WILDCARD_FILTER) {
        return fresh.to_vec();
    }
    fresh
        .iter()
        .filter(|location| {
            let location = location.to_lowercase();
            filters
                .iter()
                .any(|filter| location.contains(&filter.to_lowercase()))
        })
        .cloned()
        .collect()
}

fn compose_alert_message(alert: &Alert, matched: &[String]) -> String {
    format!(
        "🚨 {} 🚨\n{}\n\nמיקומים:\n{}",
        alert.title,
        alert.description,
        matched.join("\n")
    )
}
