//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests of a harvest pass:
//! - Building the HTTP client with the site's static request headers
//! - GET requests for listing pages (with paging query parameters)
//! - GET requests for procedure pages
//! - Streaming document downloads to disk
//!
//! Nothing here retries; callers wrap these calls in [`crate::crawler::retry`].

use crate::config::{HttpConfig, SiteConfig};
use crate::crawler::PageCursor;
use crate::procedure::DocumentRef;
use crate::{ConfigError, HarvestError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// A fetched page: final URL, status and body
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects
    pub url: String,

    pub status: StatusCode,

    pub body: String,
}

/// Builds an HTTP client with the configured headers and timeout
///
/// # Arguments
///
/// * `site` - Supplies the static request headers
/// * `http` - Supplies the request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HarvestError)` - A header is invalid or the client failed to build
pub fn build_http_client(site: &SiteConfig, http: &HttpConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &site.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::Validation(format!("Invalid header name '{}': {}", name, e))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            ConfigError::Validation(format!("Invalid value for header '{}': {}", name, e))
        })?;
        headers.insert(name, value);
    }

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(http.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|source| HarvestError::Http {
            url: site.base_url.clone(),
            source,
        })
}

/// HTTP access to one procurement site
#[derive(Debug, Clone)]
pub struct SiteClient {
    client: Client,
    base_url: Url,
    download_timeout: Duration,
}

impl SiteClient {
    /// Creates a client for the configured site
    pub fn new(site: &SiteConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(site, http)?,
            base_url: Url::parse(&site.base_url)?,
            download_timeout: Duration::from_secs(http.download_timeout_secs),
        })
    }

    /// Base URL relative links are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches one listing page
    ///
    /// Sends `limit`, `page` and `sort` from the cursor as query parameters.
    /// Any status other than 200 is an `UnexpectedStatus` error.
    pub async fn fetch_listing(&self, section_url: &str, cursor: &PageCursor) -> Result<FetchedPage> {
        let page = cursor.page.to_string();
        let limit = cursor.page_size.to_string();
        let request = self.client.get(section_url).query(&[
            ("limit", limit.as_str()),
            ("page", page.as_str()),
            ("sort", cursor.sort.as_str()),
        ]);

        let fetched = self.send(section_url, request).await?;
        if fetched.status != StatusCode::OK {
            return Err(HarvestError::UnexpectedStatus {
                url: fetched.url,
                status: fetched.status.as_u16(),
            });
        }
        Ok(fetched)
    }

    /// Fetches a procedure page
    ///
    /// The status is returned as-is; classifying it is up to
    /// [`crate::procedure::normalize_detail`].
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        self.send(url, self.client.get(url)).await
    }

    /// Streams a document to its destination, overwriting any existing file
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - Bytes written
    /// * `Err(HarvestError)` - Transport failure, non-success status or local I/O error
    pub async fn download(&self, document: &DocumentRef) -> Result<u64> {
        let http_error = |source| HarvestError::Http {
            url: document.url.clone(),
            source,
        };

        let mut response = self
            .client
            .get(&document.url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            return Err(HarvestError::UnexpectedStatus {
                url: document.url.clone(),
                status: response.status().as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(&document.path).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(http_error)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(
            "Downloaded {} ({} bytes) to {}",
            document.url,
            written,
            document.path.display()
        );
        Ok(written)
    }

    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> Result<FetchedPage> {
        let http_error = |source| HarvestError::Http {
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(http_error)?;
        let final_url = response.url().to_string();
        let status = response.status();
        let body = response.text().await.map_err(http_error)?;

        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn site(headers: BTreeMap<String, String>) -> SiteConfig {
        SiteConfig {
            base_url: "https://www.example.com".to_string(),
            sections: vec!["rosneft".to_string()],
            page_size: 100,
            sort: "datestart".to_string(),
            headers,
        }
    }

    #[test]
    fn test_build_http_client() {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), "Mozilla/5.0".to_string());
        headers.insert("Accept-Language".to_string(), "ru,en;q=0.5".to_string());

        let result = build_http_client(&site(headers), &HttpConfig::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_header_is_config_error() {
        let mut headers = BTreeMap::new();
        headers.insert("Bad Header".to_string(), "x".to_string());

        let err = build_http_client(&site(headers), &HttpConfig::default()).unwrap_err();
        assert!(matches!(err, HarvestError::Config(ConfigError::Validation(_))));
    }
}
