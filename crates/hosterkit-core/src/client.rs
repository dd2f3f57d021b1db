//! HTTP client wrapper shared by all resolvers
//!
//! Thin layer over a pooled `reqwest::Client` that gives every request an
//! explicit timeout and returns the post-redirect URL together with the body.
//! It does not rate-limit or retry; both are the caller's policy.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

use crate::error::{ResolveError, Result};

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for the HTTP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout for page and API requests in seconds (default: 15)
    pub timeout_secs: u64,
    /// Timeout for media reachability probes in seconds (default: 10)
    pub verify_timeout_secs: u64,
    /// Maximum redirects followed per request (default: 10)
    pub max_redirects: usize,
    /// Browser-like User-Agent sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            verify_timeout_secs: 10,
            max_redirects: 10,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// A fetched response: status, final URL after redirects, and body text
#[derive(Debug, Clone)]
pub struct Page {
    pub status: StatusCode,
    pub url: Url,
    pub body: String,
}

impl Page {
    /// Fails with `Status` unless the server answered 200
    pub fn ensure_ok(self) -> Result<Self> {
        if self.status != StatusCode::OK {
            return Err(ResolveError::Status {
                status: self.status.as_u16(),
                url: self.url.to_string(),
            });
        }
        Ok(self)
    }

    /// Parses the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP client handle injected into resolvers
///
/// Cloning is cheap and clones share one connection pool. Dropping an
/// in-flight request future aborts that request and releases its connection.
#[derive(Debug, Clone)]
pub struct HosterClient {
    client: reqwest::Client,
    timeout: Duration,
    verify_timeout: Duration,
}

impl HosterClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .default_headers({
                let mut headers = HeaderMap::new();
                headers.insert(
                    header::ACCEPT_LANGUAGE,
                    HeaderValue::from_static("en-US,en;q=0.9"),
                );
                headers
            })
            .build()
            .map_err(ResolveError::HttpError)?;

        Ok(Self::from_client(client, &config))
    }

    /// Wrap a caller-owned client
    ///
    /// Redirect policy, User-Agent and connection pooling come from `client`;
    /// only the per-request timeouts are taken from `config`.
    pub fn from_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
            verify_timeout: Duration::from_secs(config.verify_timeout_secs),
        }
    }

    /// GET a page
    ///
    /// Any status is returned as a [`Page`]; callers decide what counts as
    /// success. Only transport failures are errors.
    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<Page> {
        debug!(url, "GET");
        let request = with_headers(self.client.get(url), headers).timeout(self.timeout);
        read_page(request.send().await?).await
    }

    /// POST an urlencoded form
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<Page> {
        debug!(url, "POST form");
        let request = with_headers(self.client.post(url), headers)
            .form(form)
            .timeout(self.timeout);
        read_page(request.send().await?).await
    }

    /// POST a JSON body
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &[(&str, &str)],
    ) -> Result<Page> {
        debug!(url, "POST json");
        let request = with_headers(self.client.post(url), headers)
            .json(body)
            .timeout(self.timeout);
        read_page(request.send().await?).await
    }

    /// Checks that a media URL answers from this client's network context
    ///
    /// Sends HEAD with the given `Referer`. CDNs that refuse HEAD get one
    /// ranged GET for the first byte instead. The body is never read.
    ///
    /// # Errors
    /// Returns `Unreachable` if neither request succeeds
    pub async fn probe(&self, url: &str, referer: &str) -> Result<()> {
        let head = self
            .client
            .head(url)
            .header(header::REFERER, referer)
            .timeout(self.verify_timeout)
            .send()
            .await
            .map_err(|e| ResolveError::Unreachable(format!("{url}: {e}")))?;

        let status = head.status();
        trace!(url, status = status.as_u16(), "HEAD probe");
        if status.is_success() {
            return Ok(());
        }

        if !matches!(
            status,
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::FORBIDDEN | StatusCode::NOT_IMPLEMENTED
        ) {
            return Err(ResolveError::Unreachable(format!("{url}: HTTP {status}")));
        }

        let ranged = self
            .client
            .get(url)
            .header(header::REFERER, referer)
            .header(header::RANGE, "bytes=0-0")
            .timeout(self.verify_timeout)
            .send()
            .await
            .map_err(|e| ResolveError::Unreachable(format!("{url}: {e}")))?;

        let status = ranged.status();
        trace!(url, status = status.as_u16(), "ranged GET probe");
        if status.is_success() {
            Ok(())
        } else {
            Err(ResolveError::Unreachable(format!("{url}: HTTP {status}")))
        }
    }
}

fn with_headers(
    mut request: reqwest::RequestBuilder,
    headers: &[(&str, &str)],
) -> reqwest::RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request
}

async fn read_page(response: reqwest::Response) -> Result<Page> {
    let status = response.status();
    let url = response.url().clone();
    let body = response.text().await?;
    trace!(url = %url, status = status.as_u16(), bytes = body.len(), "response read");
    Ok(Page { status, url, body })
}
