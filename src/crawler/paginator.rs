//! Listing pagination
//!
//! Walks one section's listing newest-first and collects the items whose
//! registry numbers are not yet stored. The walk stops when either:
//! - the page just fetched is the last page the site declares, or
//! - the page just fetched contributed no new items.
//!
//! The second rule assumes the listing is sorted newest-first and that
//! already-stored items form a contiguous tail. Items that appear behind a
//! fully-known page are not discovered.

use crate::crawler::retry::{retry, RetryPolicy};
use crate::crawler::{parse_listing, ListingItem, ListingPage, SiteClient};
use crate::shutdown::Shutdown;
use crate::Result;
use std::collections::HashSet;

/// Pagination state of one listing walk
///
/// The cursor is passed into each page fetch and replaced by
/// [`PageCursor::advance`] once the page has been parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// 1-based page number to fetch next
    pub page: u32,

    pub page_size: u32,

    pub sort: String,

    /// Page count declared by the most recent page that had pagination
    pub total_pages: Option<u32>,

    /// False once a stop condition was met
    pub more: bool,
}

impl PageCursor {
    /// Cursor positioned on the first page
    pub fn first(page_size: u32, sort: impl Into<String>) -> Self {
        Self {
            page: 1,
            page_size,
            sort: sort.into(),
            total_pages: None,
            more: true,
        }
    }

    /// Cursor for the page after `page`
    ///
    /// # Arguments
    ///
    /// * `page` - The page fetched with this cursor
    /// * `new_items` - How many unseen items that page contributed
    pub fn advance(self, page: &ListingPage, new_items: usize) -> Self {
        let total_pages = page.total_pages.or(self.total_pages);
        // No pagination block means the listing fits on one page.
        let last_page = self.page >= total_pages.unwrap_or(1);

        Self {
            page: self.page + 1,
            total_pages,
            more: !last_page && new_items > 0,
            ..self
        }
    }
}

/// Result of walking one section's listing
#[derive(Debug, Clone)]
pub struct ListingScan {
    /// Unseen items, newest first, without duplicates
    pub items: Vec<ListingItem>,

    pub pages_fetched: u32,

    /// Cursor after the last fetched page
    pub cursor: PageCursor,
}

/// Walks listing pages of a section
pub struct Paginator<'a> {
    client: &'a SiteClient,
    policy: &'a RetryPolicy,
    shutdown: &'a Shutdown,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a SiteClient, policy: &'a RetryPolicy, shutdown: &'a Shutdown) -> Self {
        Self {
            client,
            policy,
            shutdown,
        }
    }

    /// Collects every listing item not in `known`
    ///
    /// Each page is retried on its own under the page policy; a page that
    /// exhausts its budget fails the whole walk.
    ///
    /// # Arguments
    ///
    /// * `section_url` - Listing URL of the section
    /// * `known` - Registry numbers already stored
    /// * `cursor` - Starting position, usually [`PageCursor::first`]
    pub async fn collect(
        &self,
        section_url: &str,
        known: &HashSet<String>,
        mut cursor: PageCursor,
    ) -> Result<ListingScan> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut items = Vec::new();
        let mut pages_fetched = 0;

        loop {
            let page = self.fetch(section_url, &cursor).await?;
            pages_fetched += 1;

            let before = items.len();
            for item in &page.items {
                if !known.contains(&item.registry_number)
                    && seen.insert(item.registry_number.clone())
                {
                    items.push(item.clone());
                }
            }
            let new_items = items.len() - before;

            tracing::info!(
                "Collected urls from page {}{}: {} new",
                cursor.page,
                page.total_pages
                    .map(|total| format!(" of {}", total))
                    .unwrap_or_default(),
                new_items
            );

            cursor = cursor.advance(&page, new_items);
            if !cursor.more {
                break;
            }
        }

        Ok(ListingScan {
            items,
            pages_fetched,
            cursor,
        })
    }

    async fn fetch(&self, section_url: &str, cursor: &PageCursor) -> Result<ListingPage> {
        let client = self.client;
        let label = format!("listing page {} of {}", cursor.page, section_url);

        retry(self.policy, self.shutdown, &label, || async move {
            let fetched = client.fetch_listing(section_url, cursor).await?;
            parse_listing(&fetched.body, &fetched.url, client.base_url())
        })
        .await
    }
}
