//! Integration tests for the harvester
//!
//! These tests use wiremock to serve listing pages, procedure pages and
//! documents, and test full harvest passes end-to-end.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tender_harvest::config::{
    Config, FieldsConfig, HttpConfig, LoggingConfig, OutputConfig, RetryConfig, ScheduleConfig,
    SiteConfig,
};
use tender_harvest::crawler::{PageCursor, Paginator, RetryPolicy, SiteClient};
use tender_harvest::storage::{CsvTable, TableFile};
use tender_harvest::{harvest, HarvestError, Shutdown};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECTION: &str = "rosneft";

/// Creates a test configuration with no backoff and small retry budgets
fn create_test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            sections: vec![SECTION.to_string()],
            page_size: 2,
            sort: "datestart".to_string(),
            headers: BTreeMap::new(),
        },
        http: HttpConfig {
            timeout_secs: 5,
            download_timeout_secs: 5,
            max_concurrent_downloads: 2,
        },
        retry: RetryConfig {
            max_attempts: 2,
            download_max_attempts: 2,
            sleep_min_secs: 0,
            sleep_max_secs: 0,
            long_sleep_min_secs: 0,
            long_sleep_max_secs: 0,
            long_sleep_every: 10,
        },
        output: OutputConfig {
            procedures_dir: dir.display().to_string(),
            table_file: "procedures.csv".to_string(),
            lock_retry_secs: 0,
        },
        fields: FieldsConfig::default(),
        logging: LoggingConfig::default(),
        schedule: ScheduleConfig::default(),
    }
}

fn listing_html(items: &[&str], total_pages: Option<u32>) -> String {
    let mut html = String::from(r#"<html><body><header class="page-header"><h1>Закупки</h1></header>"#);
    for id in items {
        html.push_str(&format!(
            r#"<div class="section-procurement__item">
                 <a class="section-procurement__item-title" href="/{section}/procedures/{id}">Закупка {id}</a>
                 <div class="section-procurement__item-numbers"><span>Номер закупки на сайте ЭТП: {id}</span></div>
               </div>"#,
            section = SECTION,
            id = id
        ));
    }
    if let Some(total) = total_pages {
        html.push_str(r#"<ul class="pagination">"#);
        for page in 1..=total {
            html.push_str(&format!("<li>{}</li>", page));
        }
        html.push_str("</ul>");
    }
    html.push_str("</body></html>");
    html
}

fn detail_html(id: Option<&str>, documents: &[(&str, &str)]) -> String {
    let number_row = id
        .map(|id| format!("<tr><td>Номер процедуры:</td><td>{}</td></tr>", id))
        .unwrap_or_default();
    let documents: String = documents
        .iter()
        .map(|(label, href)| {
            format!(
                r#"<div class="procedure__item--documents-item"><div class="item-name"><a href="{}">{}</a></div></div>"#,
                href, label
            )
        })
        .collect();

    format!(
        r#"<html><body>
        <header class="page-header"></header>
        <span class="procedure__item-name">Поставка труб</span>
        <div class="procedure__item" id="commonInfo">
          <table class="procedure__item-table">
            {number_row}
            <tr><td>Статус:</td><td>Приём заявок</td></tr>
          </table>
        </div>
        <div class="procedure__item procedure__item--timing">
          <table class="procedure__item-table">
            <tr><td>Дата публикации процедуры:</td><td>01.05.2023 10:00:00 GMT+3</td></tr>
          </table>
        </div>
        {documents}
        </body></html>"#,
        number_row = number_row,
        documents = documents
    )
}

async fn mount_listing(server: &MockServer, page: u32, items: &[&str], total: Option<u32>) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/procedures", SECTION)))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(items, total)))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, id: &str, status: u16, body: String, expect: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/procedures/{}", SECTION, id)))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(expect)
        .mount(server)
        .await;
}

fn stored_ids(dir: &Path) -> Vec<String> {
    let table = CsvTable::new(dir.join("procedures.csv"))
        .read()
        .expect("Failed to read table")
        .unwrap_or_default();
    match table.column_index("registry_number") {
        Some(index) => table.rows.iter().map(|row| row[index].clone()).collect(),
        None => Vec::new(),
    }
}

#[tokio::test]
async fn test_full_harvest_and_rerun_is_idempotent() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().expect("Failed to create temp dir");

    mount_listing(&mock_server, 1, &["1001", "1002"], Some(1)).await;
    mount_detail(
        &mock_server,
        "1001",
        200,
        detail_html(
            Some("1001"),
            &[
                ("Извещение (pdf)", "/files/a"),
                ("Извещение (pdf)", "/files/b"),
            ],
        ),
        1,
    )
    .await;
    mount_detail(&mock_server, "1002", 200, detail_html(Some("1002"), &[]), 1).await;

    for (file, body) in [("a", "first"), ("b", "second")] {
        Mock::given(method("GET"))
            .and(path(format!("/files/{}", file)))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(&mock_server.uri(), dir.path());

    let reports = harvest(config.clone(), Shutdown::new())
        .await
        .expect("First pass failed");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].discovered, 2);
    assert_eq!(reports[0].appended, 2);
    assert_eq!(reports[0].documents, 2);

    assert_eq!(stored_ids(dir.path()), vec!["1001", "1002"]);

    let folder = dir.path().join("1001");
    assert_eq!(
        std::fs::read_to_string(folder.join("Извещение.pdf")).unwrap(),
        "first"
    );
    assert_eq!(
        std::fs::read_to_string(folder.join("Извещение_1.pdf")).unwrap(),
        "second"
    );
    assert!(dir.path().join("1002").is_dir());
    assert!(dir.path().join("procedures.backup.csv").exists());

    let table = CsvTable::new(dir.path().join("procedures.csv"))
        .read()
        .unwrap()
        .unwrap();
    let date = table.column_index("publication_date").unwrap();
    assert_eq!(table.rows[0][date], "01-05-2023 10:00:00");

    // Second pass: the listing only shows stored items, so nothing is fetched or appended
    let reports = harvest(config, Shutdown::new())
        .await
        .expect("Second pass failed");
    assert_eq!(reports[0].discovered, 0);
    assert_eq!(reports[0].appended, 0);
    assert_eq!(stored_ids(dir.path()), vec!["1001", "1002"]);
}

#[tokio::test]
async fn test_pagination_stops_at_declared_total() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&mock_server, 1, &["1", "2"], Some(3)).await;
    mount_listing(&mock_server, 2, &["3", "4"], Some(3)).await;
    mount_listing(&mock_server, 3, &["5"], Some(3)).await;
    Mock::given(method("GET"))
        .and(query_param("page", "4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let client = SiteClient::new(&config.site, &config.http).unwrap();
    let policy = RetryPolicy::pages(&config.retry);
    let shutdown = Shutdown::new();

    let scan = Paginator::new(&client, &policy, &shutdown)
        .collect(
            &config.site.section_url(SECTION),
            &HashSet::new(),
            PageCursor::first(2, "datestart"),
        )
        .await
        .expect("Pagination failed");

    assert_eq!(scan.pages_fetched, 3);
    assert_eq!(scan.items.len(), 5);
    assert!(!scan.cursor.more);
}

#[tokio::test]
async fn test_pagination_stops_on_page_without_new_items() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&mock_server, 1, &["9", "8"], Some(5)).await;
    mount_listing(&mock_server, 2, &["7", "6"], Some(5)).await;
    Mock::given(method("GET"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let client = SiteClient::new(&config.site, &config.http).unwrap();
    let policy = RetryPolicy::pages(&config.retry);
    let shutdown = Shutdown::new();
    let known: HashSet<String> = ["7", "6"].iter().map(|s| s.to_string()).collect();

    let scan = Paginator::new(&client, &policy, &shutdown)
        .collect(
            &config.site.section_url(SECTION),
            &known,
            PageCursor::first(2, "datestart"),
        )
        .await
        .expect("Pagination failed");

    assert_eq!(scan.pages_fetched, 2);
    let ids: Vec<&str> = scan.items.iter().map(|i| i.registry_number.as_str()).collect();
    assert_eq!(ids, vec!["9", "8"]);
}

#[tokio::test]
async fn test_unavailable_procedures_are_skipped() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&mock_server, 1, &["2001", "2002", "2003"], None).await;
    mount_detail(&mock_server, "2001", 404, String::new(), 1).await;
    mount_detail(
        &mock_server,
        "2002",
        200,
        "<html><body>Вы не авторизированы для доступа к этой странице</body></html>".to_string(),
        1,
    )
    .await;
    mount_detail(&mock_server, "2003", 200, detail_html(Some("2003"), &[]), 1).await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let reports = harvest(config, Shutdown::new()).await.expect("Harvest failed");

    assert_eq!(reports[0].discovered, 3);
    assert_eq!(reports[0].unavailable, 2);
    assert_eq!(reports[0].appended, 1);
    assert_eq!(stored_ids(dir.path()), vec!["2003"]);
}

#[tokio::test]
async fn test_missing_registry_number_fails_after_retries() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&mock_server, 1, &["3001"], Some(1)).await;
    mount_detail(&mock_server, "3001", 200, detail_html(None, &[]), 2).await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let result = harvest(config, Shutdown::new()).await;

    assert!(matches!(
        result,
        Err(HarvestError::MissingRegistryNumber { .. })
    ));
    assert!(!dir.path().join("procedures.csv").exists());
}

#[tokio::test]
async fn test_malformed_listing_fails_after_retries() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(format!("/{}/procedures", SECTION)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Maintenance</body></html>"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let result = harvest(config, Shutdown::new()).await;

    assert!(matches!(result, Err(HarvestError::MalformedPage { .. })));
}

#[tokio::test]
async fn test_failed_download_keeps_row_out_of_table() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&mock_server, 1, &["4001"], Some(1)).await;
    mount_detail(
        &mock_server,
        "4001",
        200,
        detail_html(Some("4001"), &[("Документация (zip)", "/files/broken")]),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let result = harvest(config, Shutdown::new()).await;

    assert!(matches!(
        result,
        Err(HarvestError::UnexpectedStatus { status: 500, .. })
    ));
    assert!(stored_ids(dir.path()).is_empty());
}

#[tokio::test]
async fn test_existing_document_is_downloaded_again() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Left behind by a pass that stopped before writing the row
    let folder = dir.path().join("6001");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("Протокол.pdf"), "stale and much longer content").unwrap();

    mount_listing(&mock_server, 1, &["6001"], Some(1)).await;
    mount_detail(
        &mock_server,
        "6001",
        200,
        detail_html(Some("6001"), &[("Протокол (pdf)", "/files/protocol")]),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/protocol"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let reports = harvest(config, Shutdown::new())
        .await
        .expect("Harvest failed");

    assert_eq!(reports[0].documents, 1);
    assert_eq!(
        std::fs::read_to_string(folder.join("Протокол.pdf")).unwrap(),
        "fresh"
    );
    assert!(!folder.join("Протокол_1.pdf").exists());
    assert_eq!(stored_ids(dir.path()), vec!["6001"]);
}

#[tokio::test]
async fn test_interrupt_stops_after_current_item() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_listing(&mock_server, 1, &["5001", "5002"], Some(1)).await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/procedures/5001", SECTION)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(detail_html(Some("5001"), &[]))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_detail(&mock_server, "5002", 200, detail_html(Some("5002"), &[]), 0).await;

    let config = create_test_config(&mock_server.uri(), dir.path());
    let shutdown = Shutdown::new();

    // Interrupt while the first procedure page is in flight
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.trigger();
    });

    let result = harvest(config, shutdown).await;

    assert!(matches!(result, Err(HarvestError::Interrupted)));
    assert_eq!(stored_ids(dir.path()), vec!["5001"]);
}
