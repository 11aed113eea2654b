//! Windowed deduplication of alert notifications.
//!
//! Two expiring keyspaces back the filter: alert ids that were fully
//! handled, and per-title lists of locations already notified. Both share
//! one TTL, which defines the dedup window.

use crate::alerts::model::Alert;
use crate::cache::TemporalCache;
use log::debug;
use std::time::Duration;

pub struct DeduplicationFilter {
    handled_ids: TemporalCache<String, Alert>,
    handled_titles: TemporalCache<String, Vec<String>>,
}

impl DeduplicationFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            handled_ids: TemporalCache::new(window),
            handled_titles: TemporalCache::new(window),
        }
    }

    pub fn window(&self) -> Duration {
        self.handled_ids.default_ttl()
    }

    /// Returns the locations of `alert` that have not yet been notified
    /// this window, and records the alert as handled when that list is
    /// non-empty.
    ///
    /// An alert whose locations were all seen before leaves the caches
    /// untouched, so a later report under the same title is still judged
    /// against the currently recorded set.
    pub async fn screen(&self, alert: &Alert) -> Vec<String> {
        let fresh = self.fresh_locations(alert).await;
        if !fresh.is_empty() {
            self.handled_ids
                .put(alert.id.clone(), alert.clone(), None)
                .await;
            self.handled_titles
                .put(alert.title.clone(), alert.locations.clone(), None)
                .await;
            debug!(
                "Recorded alert {} ({} fresh of {} locations)",
                alert.id,
                fresh.len(),
                alert.locations.len()
            );
        }
        fresh
    }

    async fn fresh_locations(&self, alert: &Alert) -> Vec<String> {
        // A remembered id means the whole alert was already handled.
        if self.handled_ids.contains(&alert.id).await {
            return Vec::new();
        }
        match self.handled_titles.get(&alert.title).await {
            // First sighting of this event name.
            None => alert.locations.clone(),
            // Order-preserving subsequence of locations not yet notified.
            Some(seen) => alert
                .locations
                .iter()
                .filter(|location| !seen.contains(location))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::model::AlertCategory;
    use pretty_assertions::assert_eq;
    use tokio::time::sleep;

    fn alert(id: &str, title: &str, locations: &[&str]) -> Alert {
        Alert {
            id: id.to_string(),
            category: AlertCategory::Now,
            title: title.to_string(),
            locations: locations.iter().map(|s| s.to_string()).collect(),
            description: "take cover".to_string(),
        }
    }

    fn filter() -> DeduplicationFilter {
        DeduplicationFilter::new(Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn first_sighting_passes_all_locations() {
        let filter = filter();
        let fresh = filter.screen(&alert("1", "T", &["A", "B"])).await;
        assert_eq!(fresh, vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_id_is_fully_suppressed() {
        let filter = filter();
        let first = alert("1", "T", &["A", "B"]);
        filter.screen(&first).await;
        assert!(filter.screen(&first).await.is_empty());
        // Even with new locations attached: the id was handled.
        assert!(filter.screen(&alert("1", "T", &["A", "B", "C"])).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn new_id_same_title_passes_only_new_locations() {
        let filter = filter();
        filter.screen(&alert("1", "T", &["A", "B"])).await;
        let fresh = filter.screen(&alert("2", "T", &["A", "C"])).await;
        assert_eq!(fresh, vec!["C".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn suppressed_followup_does_not_disturb_recorded_state() {
        let filter = filter();
        filter.screen(&alert("1", "T", &["A", "B"])).await;
        // Nothing new: no cache write happens.
        assert!(filter.screen(&alert("2", "T", &["A"])).await.is_empty());
        // The originally recorded set still governs the next report.
        let fresh = filter.screen(&alert("3", "T", &["B", "D"])).await;
        assert_eq!(fresh, vec!["D".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_first_sighting_records_nothing() {
        let filter = filter();
        assert!(filter.screen(&alert("1", "T", &[])).await.is_empty());
        // The title was never recorded, so a real report sails through.
        let fresh = filter.screen(&alert("2", "T", &["A"])).await;
        assert_eq!(fresh, vec!["A".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_allows_renotification() {
        let filter = filter();
        let report = alert("1", "T", &["A", "B"]);
        filter.screen(&report).await;
        sleep(Duration::from_secs(61)).await;
        let fresh = filter.screen(&report).await;
        assert_eq!(fresh, vec!["A".to_string(), "B".to_string()]);
    }
}
