//! reqwest-backed transport

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::transport::{Transport, TransportRequest};
use crate::{ArchiveError, Result};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// Cookies persist for the lifetime of the client and redirects are
/// followed up to 10 hops.
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Timeouts come from here
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Transport bound to one site root
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    root_url: String,
    max_retries: u32,
    backoff: Duration,
}

/// How a failed attempt should be handled
enum Failure {
    Retry(String),
    Fatal(String),
}

impl HttpTransport {
    pub fn new(client: Client, root_url: &str, max_retries: u32, backoff: Duration) -> Self {
        Self {
            client,
            root_url: root_url.trim_end_matches('/').to_string(),
            max_retries,
            backoff,
        }
    }

    /// Builds a client from configuration and binds it to `root_url`
    pub fn from_config(
        user_agent: &UserAgentConfig,
        crawler: &CrawlerConfig,
        root_url: &str,
    ) -> Result<Self> {
        let client = build_http_client(user_agent, crawler)?;
        Ok(Self::new(
            client,
            root_url,
            crawler.max_retries,
            crawler.retry_backoff(),
        ))
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Absolute URL for a site-relative path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.root_url, path)
    }

    async fn attempt(&self, url: &str, request: &TransportRequest) -> std::result::Result<String, Failure> {
        let builder = match &request.form {
            Some(form) => self.client.post(url).form(form),
            None => self.client.get(url),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() || e.is_request() {
                Failure::Retry(e.to_string())
            } else {
                Failure::Fatal(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Failure::Retry(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(Failure::Fatal(format!("HTTP {}", status.as_u16())));
        }

        response
            .text()
            .await
            .map_err(|e| Failure::Retry(e.to_string()))
    }
}

impl Transport for HttpTransport {
    /// Fetches with up to `max_retries` retries after the first attempt
    ///
    /// Attempt `n` (1-based) is followed by a wait of `n × backoff`.
    async fn fetch(&self, request: &TransportRequest) -> Result<String> {
        let url = self.url_for(&request.path);
        let mut retries = 0u32;

        loop {
            tracing::debug!("[{}] {}", request.method(), url);
            match self.attempt(&url, request).await {
                Ok(body) => return Ok(body),
                Err(Failure::Fatal(message)) => {
                    return Err(ArchiveError::Transport { url, message });
                }
                Err(Failure::Retry(message)) if retries < self.max_retries => {
                    retries += 1;
                    let wait = self.backoff * retries;
                    tracing::warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        url,
                        message,
                        retries,
                        self.max_retries,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(Failure::Retry(message)) => {
                    return Err(ArchiveError::Transport {
                        url,
                        message: format!("{} (after {} retries)", message, retries),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestArchiver".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&create_test_config(), &CrawlerConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_user_agent_format() {
        assert_eq!(
            create_test_config().header_value(),
            "TestArchiver/1.0 (+https://example.com/about; admin@example.com)"
        );
    }

    #[test]
    fn test_url_for_strips_trailing_slash() {
        let transport = HttpTransport::from_config(
            &create_test_config(),
            &CrawlerConfig::default(),
            "https://artofproblemsolving.com/",
        )
        .unwrap();
        assert_eq!(
            transport.url_for("/community/c6h1"),
            "https://artofproblemsolving.com/community/c6h1"
        );
    }

    // Retry behavior against live responses is covered by the wiremock
    // integration tests.
}
