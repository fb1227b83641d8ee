//! Configuration loading
//!
//! The file is read once; the same bytes are parsed, validated and hashed so
//! the logged hash always matches the configuration that was used.

use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, parses and validates the harvester configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use tender_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Page size: {}", config.site.page_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration text and checks it with [`validate`]
///
/// Missing sections and keys take their defaults.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex SHA-256 of the configuration file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    Ok(hash_content(&content))
}

fn hash_content(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Loads the configuration together with the hash of its file
///
/// # Returns
///
/// * `Ok((Config, String))` - Validated configuration and hex SHA-256 of the bytes it was parsed from
/// * `Err(ConfigError)` - The file could not be read, parsed or validated
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(content.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[site]
base-url = "https://www.example.com"
sections = ["rosneft", "rosnefttkp"]
page-size = 50

[retry]
max-attempts = 5

[output]
procedures-dir = "out"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.site.sections.len(), 2);
        assert_eq!(config.site.page_size, 50);
        assert_eq!(config.site.sort, "datestart");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.download_max_attempts, 3);
        assert_eq!(config.output.table_path(), Path::new("out").join("procedures.csv"));
        assert!(config.fields.date_fields.contains(&"publication_date".to_string()));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let config_content = "this is not valid TOML {{{";
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[site]
base-url = "https://www.example.com"
sections = []
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let config_content = "test content";
        let file = create_temp_config(config_content);

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        // Same content should produce same hash
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 produces 64 hex characters
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_hash_matches_loaded_content() {
        let file = create_temp_config(
            r#"
[site]
base-url = "https://www.example.com"
sections = ["rosneft"]
"#,
        );

        let (config, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(config.site.sections, vec!["rosneft".to_string()]);
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
    }

    #[test]
    fn test_parse_config_applies_defaults() {
        let config = parse_config(
            r#"
[site]
base-url = "https://www.example.com"
sections = ["rosneft"]
"#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 31);
    }
}
