//! Shared helpers.
//!
//! - **Feed URL vetting**: rejects URLs that would make the batch fetch
//!   internal or non-HTTP resources

mod feed_url;

pub use feed_url::{validate_feed_url, FeedUrlError};
