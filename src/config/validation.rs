use crate::config::types::{Config, FieldsConfig, HttpConfig, RetryConfig, SiteConfig};
use crate::ConfigError;
use chrono::NaiveTime;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_http_config(&config.http)?;
    validate_retry_config(&config.retry)?;
    validate_fields_config(&config.fields)?;

    if config.output.procedures_dir.is_empty() {
        return Err(ConfigError::Validation(
            "procedures_dir cannot be empty".to_string(),
        ));
    }
    if config.output.table_file.is_empty() {
        return Err(ConfigError::Validation(
            "table_file cannot be empty".to_string(),
        ));
    }

    parse_daily_at(&config.schedule.daily_at)?;
    Ok(())
}

/// Parses the `daily-at` schedule value (`HH:MM`)
pub fn parse_daily_at(value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
        ConfigError::Validation(format!("daily_at must be HH:MM, got '{}': {}", value, e))
    })
}

/// Validates site layout configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.sections.is_empty() {
        return Err(ConfigError::Validation(
            "At least one section must be configured".to_string(),
        ));
    }

    for section in &config.sections {
        if section.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation(
                "Section names cannot be empty".to_string(),
            ));
        }
    }

    if config.page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "page_size must be >= 1, got {}",
            config.page_size
        )));
    }

    Ok(())
}

/// Validates HTTP client configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 || config.download_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be > 0 seconds".to_string(),
        ));
    }

    if config.max_concurrent_downloads < 1 || config.max_concurrent_downloads > 16 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_downloads must be between 1 and 16, got {}",
            config.max_concurrent_downloads
        )));
    }

    Ok(())
}

/// Validates retry budgets and backoff ranges
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.download_max_attempts < 1 {
        return Err(ConfigError::Validation(
            "retry attempts must be >= 1".to_string(),
        ));
    }

    if config.sleep_min_secs > config.sleep_max_secs {
        return Err(ConfigError::Validation(format!(
            "sleep range is inverted: {}..{}",
            config.sleep_min_secs, config.sleep_max_secs
        )));
    }

    if config.long_sleep_min_secs > config.long_sleep_max_secs {
        return Err(ConfigError::Validation(format!(
            "long sleep range is inverted: {}..{}",
            config.long_sleep_min_secs, config.long_sleep_max_secs
        )));
    }

    if config.long_sleep_every < 1 {
        return Err(ConfigError::Validation(
            "long_sleep_every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates field naming configuration
fn validate_fields_config(config: &FieldsConfig) -> Result<(), ConfigError> {
    if !config
        .aliases
        .values()
        .any(|field| field == crate::procedure::REGISTRY_NUMBER)
    {
        return Err(ConfigError::Validation(format!(
            "aliases must map at least one label to '{}'",
            crate::procedure::REGISTRY_NUMBER
        )));
    }

    for (label, field) in &config.aliases {
        if label.trim().is_empty() || field.trim().is_empty() {
            return Err(ConfigError::Validation(
                "aliases cannot contain empty labels or field names".to_string(),
            ));
        }
    }

    Ok(())
}
