use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Tender-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Remote site layout
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Scheme and host that listing paths and relative links resolve against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Section slugs; each one is crawled as `{base-url}/{section}/procedures`
    pub sections: Vec<String>,

    /// Number of items requested per listing page
    #[serde(rename = "page-size", default = "defaults::page_size")]
    pub page_size: u32,

    /// Sort key sent with listing requests (newest-first by publication)
    #[serde(default = "defaults::sort")]
    pub sort: String,

    /// Static headers sent with every request
    #[serde(default = "defaults::headers")]
    pub headers: BTreeMap<String, String>,
}

impl SiteConfig {
    /// Listing URL of one section
    pub fn section_url(&self, section: &str) -> String {
        format!(
            "{}/{}/procedures",
            self.base_url.trim_end_matches('/'),
            section.trim_matches('/')
        )
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Timeout for listing and detail requests (seconds)
    #[serde(rename = "timeout-secs", default = "defaults::timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for a single document download (seconds)
    #[serde(
        rename = "download-timeout-secs",
        default = "defaults::download_timeout_secs"
    )]
    pub download_timeout_secs: u64,

    /// Documents of one procedure downloaded at the same time
    #[serde(
        rename = "max-concurrent-downloads",
        default = "defaults::max_concurrent_downloads"
    )]
    pub max_concurrent_downloads: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::timeout_secs(),
            download_timeout_secs: defaults::download_timeout_secs(),
            max_concurrent_downloads: defaults::max_concurrent_downloads(),
        }
    }
}

/// Retry budgets and backoff ranges
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts for listing pages and procedure pages
    #[serde(rename = "max-attempts", default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Attempts for a single document download
    #[serde(
        rename = "download-max-attempts",
        default = "defaults::download_max_attempts"
    )]
    pub download_max_attempts: u32,

    #[serde(rename = "sleep-min-secs", default = "defaults::sleep_min_secs")]
    pub sleep_min_secs: u64,

    #[serde(rename = "sleep-max-secs", default = "defaults::sleep_max_secs")]
    pub sleep_max_secs: u64,

    #[serde(
        rename = "long-sleep-min-secs",
        default = "defaults::long_sleep_min_secs"
    )]
    pub long_sleep_min_secs: u64,

    #[serde(
        rename = "long-sleep-max-secs",
        default = "defaults::long_sleep_max_secs"
    )]
    pub long_sleep_max_secs: u64,

    /// Every n-th failed attempt waits for the long range instead
    #[serde(rename = "long-sleep-every", default = "defaults::long_sleep_every")]
    pub long_sleep_every: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            download_max_attempts: defaults::download_max_attempts(),
            sleep_min_secs: defaults::sleep_min_secs(),
            sleep_max_secs: defaults::sleep_max_secs(),
            long_sleep_min_secs: defaults::long_sleep_min_secs(),
            long_sleep_max_secs: defaults::long_sleep_max_secs(),
            long_sleep_every: defaults::long_sleep_every(),
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root folder holding one sub-folder per procedure
    #[serde(rename = "procedures-dir", default = "defaults::procedures_dir")]
    pub procedures_dir: String,

    /// Table file name, relative to `procedures-dir` unless absolute
    #[serde(rename = "table-file", default = "defaults::table_file")]
    pub table_file: String,

    /// Pause between attempts while the table is locked (seconds)
    #[serde(rename = "lock-retry-secs", default = "defaults::lock_retry_secs")]
    pub lock_retry_secs: u64,
}

impl OutputConfig {
    /// Full path of the table file
    pub fn table_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.procedures_dir).join(&self.table_file)
    }

    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_secs(self.lock_retry_secs)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            procedures_dir: defaults::procedures_dir(),
            table_file: defaults::table_file(),
            lock_retry_secs: defaults::lock_retry_secs(),
        }
    }
}

/// Field naming and date handling
#[derive(Debug, Clone, Deserialize)]
pub struct FieldsConfig {
    /// Site label -> canonical column name
    #[serde(default = "defaults::aliases")]
    pub aliases: BTreeMap<String, String>,

    /// Canonical columns whose values are timestamps
    #[serde(rename = "date-fields", default = "defaults::date_fields")]
    pub date_fields: Vec<String>,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            aliases: defaults::aliases(),
            date_fields: defaults::date_fields(),
        }
    }
}

/// Logging sink configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Append-only log file written next to stdout
    #[serde(default = "defaults::log_file")]
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: defaults::log_file(),
        }
    }
}

/// Daily trigger for the `schedule` command
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Local wall-clock time, `HH:MM`
    #[serde(rename = "daily-at", default = "defaults::daily_at")]
    pub daily_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: defaults::daily_at(),
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;

    pub fn page_size() -> u32 {
        100
    }
    pub fn sort() -> String {
        "datestart".into()
    }
    pub fn headers() -> BTreeMap<String, String> {
        let ua_platform = if cfg!(target_os = "windows") {
            "(Windows NT 10.0; Win64; x64; rv:108.0)"
        } else {
            "(X11; Ubuntu; Linux x86_64; rv:108.0)"
        };
        BTreeMap::from([
            (
                "User-Agent".to_string(),
                format!("Mozilla/5.0 {ua_platform} Gecko/20100101 Firefox/108.0"),
            ),
            ("Accept".to_string(), "*/*".to_string()),
            (
                "Accept-Language".to_string(),
                "ru-RU,ru;q=0.8,en-US;q=0.5,en;q=0.3".to_string(),
            ),
        ])
    }

    pub fn timeout_secs() -> u64 {
        60
    }
    pub fn download_timeout_secs() -> u64 {
        20 * 60
    }
    pub fn max_concurrent_downloads() -> usize {
        1
    }

    pub fn max_attempts() -> u32 {
        31
    }
    pub fn download_max_attempts() -> u32 {
        3
    }
    pub fn sleep_min_secs() -> u64 {
        30
    }
    pub fn sleep_max_secs() -> u64 {
        60
    }
    pub fn long_sleep_min_secs() -> u64 {
        3 * 60
    }
    pub fn long_sleep_max_secs() -> u64 {
        6 * 60
    }
    pub fn long_sleep_every() -> u32 {
        10
    }

    pub fn procedures_dir() -> String {
        "procedures".into()
    }
    pub fn table_file() -> String {
        "procedures.csv".into()
    }
    pub fn lock_retry_secs() -> u64 {
        5
    }

    pub fn aliases() -> BTreeMap<String, String> {
        [
            ("Номер закупки", "registry_number"),
            ("Номер процедуры", "registry_number"),
            ("Наименование закупки", "title"),
            ("Способ закупки", "method"),
            ("Способ проведения", "method"),
            ("Статус", "status"),
            ("Этап", "status"),
            ("Дата публикации процедуры", "publication_date"),
            ("Дата публикации", "publication_date"),
            ("Организатор", "organizer_name"),
            ("Наименование организатора", "organizer_name"),
            ("Адрес организатора", "organizer_address"),
            ("Почтовый адрес", "organizer_address"),
            ("Контактное лицо", "contact_person"),
            ("Адрес электронной почты", "contact_email"),
            ("E-mail", "contact_email"),
            ("Телефон", "contact_phone"),
            ("Контактный телефон", "contact_phone"),
            ("Дата начала срока подачи заявок", "submission_start"),
            ("Дата начала приема заявок", "submission_start"),
            ("Дата окончания срока подачи заявок", "submission_deadline"),
            ("Дата окончания приема заявок", "submission_deadline"),
            ("Дата рассмотрения заявок", "review_date"),
            ("Дата подведения итогов", "summary_date"),
        ]
        .into_iter()
        .map(|(label, field)| (label.to_string(), field.to_string()))
        .collect()
    }

    pub fn date_fields() -> Vec<String> {
        [
            "publication_date",
            "submission_start",
            "submission_deadline",
            "review_date",
            "summary_date",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    pub fn log_file() -> String {
        "harvest.log".into()
    }
    pub fn daily_at() -> String {
        "20:00".into()
    }
}
