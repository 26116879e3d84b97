//! RSS ingestion batch for a bookmark shelf.
//!
//! Active feeds are fetched, parsed, deduplicated against existing
//! bookmarks and feed history, and stored as new bookmarks. Every run and
//! every feed attempt is recorded in the batch log.

pub mod api;
pub mod batch;
pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
