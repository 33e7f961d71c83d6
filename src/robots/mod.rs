//! Robots.txt handling module
//!
//! This module provides fetching, parsing and caching of robots.txt files,
//! and the per-host crawl-delay gates that space out requests.
//!
//! # Components
//!
//! - `RobotsCache`: bounded cache of rulesets keyed by physical host
//! - `Gate`: per (host, user-agent) crawl-delay admission gate
//! - `ParsedRobots`: default ruleset built on the robotstxt crate
//! - `RobotsFetcher`: downloads `/robots.txt` through a raw transport

mod cache;
mod gate;
mod parser;

pub use cache::{RobotsCache, DEFAULT_CAPACITY, DEFAULT_EVICTION_FRACTION};
pub use gate::{Admission, Gate, GateTicket, MAX_SPACING};
pub use parser::{product_token, ParsedRobots, MAX_CRAWL_DELAY};

use crate::client::Transport;
use crate::url::HostTarget;
use async_trait::async_trait;
use reqwest::{Method, Request};
use std::time::Duration;

/// Well-known path of the robots document
pub const ROBOTS_PATH: &str = "/robots.txt";

/// Verdict of a ruleset for one (user agent, path) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Whether the path may be fetched
    pub allowed: bool,
    /// The rule line that decided, empty if none matched
    pub clause: String,
    /// Minimum spacing between requests declared for the agent
    pub crawl_delay: Option<Duration>,
}

/// A parsed crawl ruleset that can be asked for grants
pub trait Ruleset: Send + Sync + 'static {
    /// Parses a robots document, `None` if it cannot be understood
    fn parse(body: &str) -> Option<Self>
    where
        Self: Sized;

    /// Evaluates `path` for `user_agent`
    fn grant(&self, user_agent: &str, path: &str) -> Grant;
}

/// Source of rulesets for cache misses
///
/// Failures are not errors: implementations return `None` and the cache
/// remembers the host as unrestricted.
#[async_trait]
pub trait RulesetFetcher<R>: Send + Sync {
    async fn fetch_ruleset(&self, target: &HostTarget) -> Option<R>;
}

/// Fetches `/robots.txt` through a transport that is not itself intercepted
#[derive(Debug)]
pub struct RobotsFetcher<'a, T: ?Sized> {
    transport: &'a T,
}

impl<'a, T: Transport + ?Sized> RobotsFetcher<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<'a, T, R> RulesetFetcher<R> for RobotsFetcher<'a, T>
where
    T: Transport + ?Sized,
    R: Ruleset,
{
    async fn fetch_ruleset(&self, target: &HostTarget) -> Option<R> {
        let body = fetch_robots(self.transport, target).await?;
        R::parse(&body)
    }
}

/// Downloads the robots document of `target`
///
/// # Arguments
///
/// * `transport` - The raw transport to use
/// * `target` - The host whose robots.txt is wanted
///
/// # Returns
///
/// * `Some(String)` - The document body
/// * `None` - Network error, non-success status or a body that is not UTF-8
pub async fn fetch_robots<T>(transport: &T, target: &HostTarget) -> Option<String>
where
    T: Transport + ?Sized,
{
    let url = match target.robots_url() {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Cannot build robots.txt URL for {}: {}", target, e);
            return None;
        }
    };

    let response = match transport.execute(Request::new(Method::GET, url.clone())).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}", url, e);
            return None;
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::debug!("{} answered HTTP {}", url, status.as_u16());
        return None;
    }

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", url, e);
            return None;
        }
    };

    match String::from_utf8(bytes.to_vec()) {
        Ok(body) => Some(body),
        Err(_) => {
            tracing::warn!("{} is not valid UTF-8, ignoring it", url);
            None
        }
    }
}
