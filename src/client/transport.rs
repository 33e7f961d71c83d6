//! Raw HTTP transport
//!
//! The interceptor forwards admitted requests, and fetches robots.txt, through
//! a `Transport`. Requests sent straight through a transport are never checked
//! against robots.txt.

use crate::config::{HttpConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::{Client, Request, Response};
use std::sync::Arc;
use std::time::Duration;

/// Something that can send an HTTP request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the response
    async fn execute(&self, request: Request) -> reqwest::Result<Response>;
}

#[async_trait]
impl Transport for Client {
    async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        Client::execute(self, request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        (**self).execute(request).await
    }
}

/// Builds an HTTP client identifying the crawler
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `http` - Timeouts of the underlying connection
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use robots_warden::client::build_http_client;
/// use robots_warden::config::{HttpConfig, UserAgentConfig};
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "WardenBot".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    http: &HttpConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(http.timeout_secs))
        .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}
