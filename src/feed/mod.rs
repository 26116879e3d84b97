//! Feed retrieval and parsing.
//!
//! - [`fetcher`] - HTTP download of raw feed XML
//! - [`parser`] - RSS 2.0 / Atom parsing into [`crate::storage::Article`]s
//!
//! # Example
//!
//! ```ignore
//! use shelf::feed::{parse_feed, FeedFetcher};
//!
//! let fetcher = FeedFetcher::new("shelf-rss-batch/0.1", 10 * 1024 * 1024)?;
//! let xml = fetcher.fetch_feed("https://example.com/feed.xml").await?;
//! let parsed = parse_feed(&xml)?;
//! ```

mod fetcher;
mod parser;

pub use fetcher::{FeedFetcher, FetchError, DEFAULT_MAX_FEED_SIZE};
pub use parser::{parse_feed, FeedDocument, ParseError, ParseResult};
