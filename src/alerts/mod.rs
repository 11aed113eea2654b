//! Alert feed pipeline: wire model, fetch/decode, windowed deduplication,
//! and the poll loop that drives them.

pub mod dedup;
pub mod fetcher;
pub mod model;
pub mod monitor;

pub use dedup::DeduplicationFilter;
pub use fetcher::{decode_feed_body, AlertFetcher, AlertSource, FeedPoll, EMPTY_FEED_BODY};
pub use model::{Alert, AlertCategory};
pub use monitor::{AlertMonitor, AlertPipeline};
