//! Harvest coordinator - main orchestration logic
//!
//! This module drives one harvest pass:
//! - Reading the registry numbers already stored
//! - Walking each section's listing for new procedures
//! - Fetching and normalizing procedure pages
//! - Downloading documents into per-procedure folders
//! - Appending one row per procedure
//! - Stopping cleanly at item boundaries on interrupt

use crate::config::Config;
use crate::crawler::paginator::{PageCursor, Paginator};
use crate::crawler::retry::{retry, RetryPolicy};
use crate::crawler::{ListingItem, SiteClient};
use crate::procedure::{
    normalize_detail, resolve_documents, sanitize_filename, DetailOutcome, DocumentRef,
};
use crate::shutdown::Shutdown;
use crate::storage::{open_store, CsvTable, TabularStore};
use crate::{HarvestError, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Summary of one section's harvest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionReport {
    pub section: String,

    /// New listing items found
    pub discovered: usize,

    /// Rows appended to the table
    pub appended: usize,

    /// Procedures skipped as expired, withdrawn or restricted
    pub unavailable: usize,

    /// Documents downloaded
    pub documents: usize,
}

/// What happened to one listing item
enum ItemOutcome {
    Appended { documents: usize },
    AlreadyStored,
    Unavailable,
}

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    client: SiteClient,
    store: TabularStore<CsvTable>,
    shutdown: Shutdown,
    page_policy: RetryPolicy,
    document_policy: RetryPolicy,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Creates the procedures folder if it does not exist yet.
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `shutdown` - Interrupt flag checked between items
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to build the HTTP client or the folder
    pub fn new(config: Config, shutdown: Shutdown) -> Result<Self> {
        std::fs::create_dir_all(&config.output.procedures_dir)?;

        let client = SiteClient::new(&config.site, &config.http)?;
        let store = open_store(&config.output, shutdown.clone());
        let page_policy = RetryPolicy::pages(&config.retry);
        let document_policy = RetryPolicy::documents(&config.retry);

        Ok(Self {
            config: Arc::new(config),
            client,
            store,
            shutdown,
            page_policy,
            document_policy,
        })
    }

    /// Runs one pass over every configured section, in order
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<SectionReport>)` - One report per section
    /// * `Err(HarvestError::Interrupted)` - Stopped on interrupt after the last complete item
    /// * `Err(HarvestError)` - An item exhausted its retries or a local failure occurred
    pub async fn run(&self) -> Result<Vec<SectionReport>> {
        let mut reports = Vec::with_capacity(self.config.site.sections.len());

        for section in &self.config.site.sections {
            let report = self.harvest_section(section).await?;
            tracing::info!(
                "Section {}: {} new, {} appended, {} unavailable, {} documents",
                report.section,
                report.discovered,
                report.appended,
                report.unavailable,
                report.documents
            );
            reports.push(report);
        }

        Ok(reports)
    }

    /// Harvests one section
    pub async fn harvest_section(&self, section: &str) -> Result<SectionReport> {
        let mut report = SectionReport {
            section: section.to_string(),
            ..Default::default()
        };

        let known = self.store.known_ids().await?;
        tracing::info!(
            "Start collecting procedure urls for {}. Already in table: {}",
            section,
            known.len()
        );

        let section_url = self.config.site.section_url(section);
        let cursor = PageCursor::first(self.config.site.page_size, self.config.site.sort.clone());
        let scan = Paginator::new(&self.client, &self.page_policy, &self.shutdown)
            .collect(&section_url, &known, cursor)
            .await?;

        report.discovered = scan.items.len();
        tracing::info!(
            "Collected {} new procedure urls for {} from {} pages",
            scan.items.len(),
            section,
            scan.pages_fetched
        );

        for (index, item) in scan.items.iter().enumerate() {
            tracing::info!(
                "Collecting procedure {} ({}/{})",
                item.registry_number,
                index + 1,
                scan.items.len()
            );

            match self.process_item(item, &known).await? {
                ItemOutcome::Appended { documents } => {
                    report.appended += 1;
                    report.documents += documents;
                }
                ItemOutcome::AlreadyStored => {}
                ItemOutcome::Unavailable => report.unavailable += 1,
            }

            if self.shutdown.is_triggered() {
                tracing::info!(
                    "Stopping after procedure {} on interrupt",
                    item.registry_number
                );
                return Err(HarvestError::Interrupted);
            }
        }

        tracing::info!(
            "Collected data of {} procedures for {}",
            report.appended,
            section
        );
        Ok(report)
    }

    async fn process_item(
        &self,
        item: &ListingItem,
        known: &HashSet<String>,
    ) -> Result<ItemOutcome> {
        let client = &self.client;
        let fields = &self.config.fields;
        let url = item.url.as_str();
        let label = format!("procedure {}", item.url);

        let outcome = retry(&self.page_policy, &self.shutdown, &label, || async move {
            let page = client.fetch_page(url).await?;
            normalize_detail(&page, client.base_url(), fields)
        })
        .await?;

        let (record, documents) = match outcome {
            DetailOutcome::Unavailable { reason } => {
                tracing::info!("Procedure {} is unavailable ({}), skipped", url, reason);
                return Ok(ItemOutcome::Unavailable);
            }
            DetailOutcome::Available { record, documents } => (record, documents),
        };

        if known.contains(record.registry_number()) {
            tracing::debug!(
                "Procedure {} is listed as {} but already stored",
                record.registry_number(),
                item.registry_number
            );
            return Ok(ItemOutcome::AlreadyStored);
        }

        let folder = self.procedure_folder(record.registry_number());
        tokio::fs::create_dir_all(&folder).await?;

        let refs = resolve_documents(&folder, &documents);
        self.download_documents(&refs).await?;

        let appended = self.store.append(&record).await?;
        if !appended {
            return Ok(ItemOutcome::AlreadyStored);
        }

        Ok(ItemOutcome::Appended {
            documents: refs.len(),
        })
    }

    /// Folder holding one procedure's documents
    pub fn procedure_folder(&self, registry_number: &str) -> PathBuf {
        Path::new(&self.config.output.procedures_dir).join(sanitize_filename(registry_number))
    }

    /// Downloads all documents, at most `max_concurrent_downloads` at a time
    ///
    /// Every download runs to completion (success or spent retries) before
    /// this returns; the first failure is then reported.
    async fn download_documents(&self, documents: &[DocumentRef]) -> Result<()> {
        let client = &self.client;
        let policy = &self.document_policy;
        let shutdown = &self.shutdown;

        let mut downloads = stream::iter(documents)
            .map(move |document| async move {
                let label = format!("document {}", document.url);
                retry(policy, shutdown, &label, move || client.download(document)).await
            })
            .buffer_unordered(self.config.http.max_concurrent_downloads.max(1));

        let mut first_error = None;
        while let Some(result) = downloads.next().await {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Runs one harvest pass over all configured sections
///
/// This is the main entry point for a harvest.
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `shutdown` - Interrupt flag
pub async fn harvest(config: Config, shutdown: Shutdown) -> Result<Vec<SectionReport>> {
    Coordinator::new(config, shutdown)?.run().await
}
