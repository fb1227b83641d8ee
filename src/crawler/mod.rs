//! Crawler module for listing traversal and procedure collection
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching of listing pages, procedure pages and documents
//! - HTML parsing of both page kinds
//! - Cursor-driven pagination with early stop
//! - Retry with randomized backoff
//! - Overall harvest coordination

mod coordinator;
mod fetcher;
mod paginator;
mod parser;
mod retry;

pub use coordinator::{harvest, Coordinator, SectionReport};
pub use fetcher::{build_http_client, FetchedPage, SiteClient};
pub use paginator::{ListingScan, PageCursor, Paginator};
pub use parser::{
    parse_detail, parse_listing, DetailPage, ListingItem, ListingPage, NOT_AUTHORIZED_MARKER,
};
pub use retry::{retry, RetryPolicy};
