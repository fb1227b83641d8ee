//! HTML parser for listing and procedure pages
//!
//! This module extracts:
//! - Listing items (registry number + procedure URL) and the declared page count
//! - Procedure titles, label/value fields and document links
//!
//! Both page kinds must carry the site's page header; a page without it is a
//! structural change on the remote side and is reported as `MalformedPage`.

use crate::procedure::{RawDocument, RawProcedure};
use crate::{HarvestError, Result};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

/// Banner shown instead of a procedure when access is restricted
pub const NOT_AUTHORIZED_MARKER: &str = "Вы не авторизированы для доступа к этой странице";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid CSS selector")
}

static PAGE_HEADER: LazyLock<Selector> = LazyLock::new(|| selector("header.page-header"));
static PAGINATION_ITEM: LazyLock<Selector> = LazyLock::new(|| selector("ul.pagination li"));
static LISTING_ITEM: LazyLock<Selector> =
    LazyLock::new(|| selector("div.section-procurement__item"));
static LISTING_NUMBER: LazyLock<Selector> =
    LazyLock::new(|| selector("div.section-procurement__item-numbers span"));
static LISTING_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector("a.section-procurement__item-title"));
static PROCEDURE_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector("span.procedure__item-name"));
static PROCEDURE_FIELD_ROW: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        "#commonInfo table.procedure__item-table tr, \
         div.procedure__item--timing table.procedure__item-table tr, \
         #orgInfo table.procedure__item-table tr",
    )
});
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static DOCUMENT_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector("div.procedure__item--documents-item div.item-name a[href]"));

/// One entry of a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    /// Registry number as shown in the listing
    pub registry_number: String,

    /// Absolute URL of the procedure page
    pub url: String,
}

/// A parsed listing page
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Items in page order
    pub items: Vec<ListingItem>,

    /// Total page count declared by the pagination block, if present
    pub total_pages: Option<u32>,
}

/// A parsed procedure page
#[derive(Debug, Clone)]
pub enum DetailPage {
    /// The site refused to show the procedure
    Unauthorized,

    /// The procedure's raw content
    Procedure(RawProcedure),
}

/// Parses a listing page
///
/// # Arguments
///
/// * `html` - The page body
/// * `page_url` - URL the page was fetched from (for error context)
/// * `base_url` - Base for resolving relative procedure links
///
/// # Returns
///
/// * `Ok(ListingPage)` - Items and the declared page count
/// * `Err(HarvestError::MalformedPage)` - Missing header, number or link
pub fn parse_listing(html: &str, page_url: &str, base_url: &Url) -> Result<ListingPage> {
    let document = Html::parse_document(html);
    require_page_header(&document, page_url)?;

    let total_pages = document
        .select(&PAGINATION_ITEM)
        .filter_map(|li| text_of(li).parse::<u32>().ok())
        .max();

    let mut items = Vec::new();
    for element in document.select(&LISTING_ITEM) {
        let number_text = element
            .select(&LISTING_NUMBER)
            .next()
            .map(text_of)
            .ok_or_else(|| malformed(page_url, "listing item without registry number"))?;
        let registry_number = registry_number_from_text(&number_text);
        if registry_number.is_empty() {
            return Err(malformed(page_url, "listing item with empty registry number"));
        }

        let href = element
            .select(&LISTING_LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .ok_or_else(|| malformed(page_url, "listing item without procedure link"))?;

        items.push(ListingItem {
            registry_number,
            url: base_url.join(href.trim())?.to_string(),
        });
    }

    Ok(ListingPage { items, total_pages })
}

/// Parses a procedure page
///
/// # Arguments
///
/// * `html` - The page body
/// * `page_url` - URL the page was fetched from
/// * `base_url` - Base for resolving relative document links
pub fn parse_detail(html: &str, page_url: &str, base_url: &Url) -> Result<DetailPage> {
    if html.contains(NOT_AUTHORIZED_MARKER) {
        return Ok(DetailPage::Unauthorized);
    }

    let document = Html::parse_document(html);
    require_page_header(&document, page_url)?;

    let title = document
        .select(&PROCEDURE_TITLE)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty());

    let mut fields = Vec::new();
    for row in document.select(&PROCEDURE_FIELD_ROW) {
        let mut cells = row.select(&CELL);
        if let (Some(label), Some(value)) = (cells.next(), cells.next()) {
            fields.push((text_of(label), text_of(value)));
        }
    }

    let mut documents = Vec::new();
    for link in document.select(&DOCUMENT_LINK) {
        if let Some(href) = link.value().attr("href") {
            documents.push(RawDocument {
                label: text_of(link),
                url: base_url.join(href.trim())?.to_string(),
            });
        }
    }

    Ok(DetailPage::Procedure(RawProcedure {
        url: page_url.to_string(),
        title,
        fields,
        documents,
    }))
}

fn require_page_header(document: &Html, page_url: &str) -> Result<()> {
    if document.select(&PAGE_HEADER).next().is_none() {
        return Err(malformed(page_url, "page header not found"));
    }
    Ok(())
}

fn malformed(page_url: &str, message: &str) -> HarvestError {
    HarvestError::MalformedPage {
        url: page_url.to_string(),
        message: message.to_string(),
    }
}

/// Element text with whitespace runs collapsed
fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `Номер закупки на сайте ЭТП: 323 000 01` -> `32300001`
fn registry_number_from_text(text: &str) -> String {
    let value = text.rsplit_once(':').map_or(text, |(_, value)| value);
    value.chars().filter(|c| !c.is_whitespace()).collect()
}
