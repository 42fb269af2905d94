//! HTTP fetching with explicit redirect-chain capture.
//!
//! Redirects are never followed silently: the client is built with
//! `redirect::Policy::none()` and hops are walked by hand so every hop's
//! status and target lands in the result. Chain length is an audit signal.

use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::config::Limits;
use crate::models::RedirectHop;
use crate::url_utils;

/// HTTP client for audit fetches.
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout_duration: Duration,
    user_agent: String,
    max_content_size: usize,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout_duration: Duration) -> Result<Self, FetchError> {
        Self::with_content_limit(user_agent, timeout_duration, Limits::MAX_CONTENT_SIZE)
    }

    pub fn with_content_limit(
        user_agent: &str,
        timeout_duration: Duration,
        max_content_size: usize,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout_duration)
            .connect_timeout(Duration::from_secs(Limits::CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(Limits::POOL_IDLE_PER_HOST)
            .pool_idle_timeout(Duration::from_secs(Limits::POOL_IDLE_TIMEOUT_SECS))
            // HTTP/1.1 for broad compatibility with small-business hosting
            .http1_only()
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            timeout_duration,
            user_agent: user_agent.to_string(),
            max_content_size,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.fetch_with_timeout(url, self.timeout_duration).await
    }

    /// Fetch one URL, walking redirects manually. The timeout applies per
    /// request, not per chain, so a slow hop cannot stall the whole job.
    pub async fn fetch_with_timeout(
        &self,
        url: &str,
        timeout_duration: Duration,
    ) -> Result<FetchedPage, FetchError> {
        let started = Instant::now();
        let mut redirect_chain: Vec<RedirectHop> = Vec::new();
        let mut current_url = url.to_string();

        loop {
            let response = timeout(
                timeout_duration,
                self.client
                    .get(&current_url)
                    .header(
                        "Accept",
                        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                    )
                    .header("Accept-Language", "en-US,en;q=0.5")
                    .send(),
            )
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(Self::classify_error)?;

            let status = response.status().as_u16();

            if (300..400).contains(&status) {
                let location = response
                    .headers()
                    .get("location")
                    .and_then(|h| h.to_str().ok())
                    .map(|s| s.to_string());

                if let Some(location) = location {
                    if redirect_chain.len() >= Limits::MAX_REDIRECT_HOPS {
                        return Err(FetchError::TooManyRedirects(redirect_chain.len()));
                    }
                    // A Location we cannot resolve ends the chain; the 3xx
                    // response itself becomes the final answer.
                    if let Some(next_url) = url_utils::resolve_link(&location, &current_url) {
                        redirect_chain.push(RedirectHop {
                            from: current_url.clone(),
                            status,
                            to: next_url.clone(),
                        });
                        current_url = next_url;
                        continue;
                    }
                }
            }

            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string());

            let x_robots_tag = {
                let values: Vec<String> = response
                    .headers()
                    .get_all("x-robots-tag")
                    .iter()
                    .filter_map(|h| h.to_str().ok())
                    .map(|s| s.to_string())
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    Some(values.join(", "))
                }
            };

            if let Some(declared) = response
                .headers()
                .get("content-length")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<usize>().ok())
            {
                if declared > self.max_content_size {
                    return Err(FetchError::ContentTooLarge(declared, self.max_content_size));
                }
            }

            let bytes = timeout(timeout_duration, response.bytes())
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(|e| FetchError::BodyError(e.to_string()))?;

            if bytes.len() > self.max_content_size {
                return Err(FetchError::ContentTooLarge(bytes.len(), self.max_content_size));
            }

            let content_length = bytes.len();
            // Decode text bodies (HTML pages, robots.txt); skip binaries.
            // A missing content type is treated as text, following the
            // many small-business hosts that omit the header.
            let is_text = content_type
                .as_deref()
                .map(|ct| {
                    let ct = ct.trim().to_ascii_lowercase();
                    url_utils::is_html_content_type(&ct)
                        || ct.starts_with("text/")
                        || ct.starts_with("application/xml")
                })
                .unwrap_or(true);
            let body = if is_text {
                String::from_utf8_lossy(&bytes).into_owned()
            } else {
                String::new()
            };

            let redirected_to = if redirect_chain.is_empty() {
                None
            } else {
                Some(current_url.clone())
            };

            return Ok(FetchedPage {
                requested_url: url.to_string(),
                final_url: current_url,
                status,
                content_type,
                x_robots_tag,
                body,
                content_length,
                elapsed_ms: started.elapsed().as_millis() as u64,
                redirect_chain,
                redirected_to,
            });
        }
    }

    /// Classify reqwest errors into the audit's failure taxonomy.
    fn classify_error(error: reqwest::Error) -> FetchError {
        let error_msg = error.to_string().to_lowercase();

        if error_msg.contains("connection refused") {
            return FetchError::ConnectionRefused;
        }
        if error_msg.contains("dns") || error_msg.contains("name resolution") {
            return FetchError::DnsError;
        }
        if error_msg.contains("ssl")
            || error_msg.contains("tls")
            || error_msg.contains("certificate")
        {
            return FetchError::SslError;
        }
        if error.is_timeout() {
            return FetchError::Timeout;
        }

        FetchError::NetworkError(error.to_string())
    }
}

/// One fetched URL: the final response plus every redirect hop on the way.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub requested_url: String,
    /// Where the chain ended; equals `requested_url` when no redirect fired.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub x_robots_tag: Option<String>,
    /// Decoded body for HTML responses, empty for everything else.
    pub body: String,
    pub content_length: usize,
    pub elapsed_ms: u64,
    pub redirect_chain: Vec<RedirectHop>,
    /// Final landing URL when the fetch was redirected at least once.
    pub redirected_to: Option<String>,
}

/// Errors that can occur during HTTP fetching. The runner records these as
/// status-0 results; they are data, not control flow.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection refused - server not accepting connections")]
    ConnectionRefused,

    #[error("DNS resolution failed")]
    DnsError,

    #[error("SSL/TLS error - certificate or encryption issue")]
    SslError,

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to read response body: {0}")]
    BodyError(String),

    #[error("Content too large: {0} bytes (max: {1} bytes)")]
    ContentTooLarge(usize, usize),

    #[error("Too many redirects ({0} hops)")]
    TooManyRedirects(usize),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}
