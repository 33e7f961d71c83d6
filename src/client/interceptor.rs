use crate::client::transport::{build_http_client, Transport};
use crate::config::{Config, CrawlDelayConfig};
use crate::robots::{ParsedRobots, RobotsCache, RobotsFetcher, Ruleset, ROBOTS_PATH};
use crate::url::{request_path, HostKey, HostTarget};
use crate::{ClientError, ClientResult};
use reqwest::header::USER_AGENT;
use reqwest::{Client, Method, Request, Response, Url};
use std::sync::Arc;

/// HTTP client that obeys robots.txt
///
/// Every request is checked against the robots.txt of its host before it is
/// sent: disallowed paths fail with [`ClientError::Denied`] without touching
/// the network, and hosts declaring a crawl-delay are throttled per user
/// agent. Hosts whose robots.txt cannot be fetched are unrestricted.
///
/// Clients sharing one [`RobotsCache`] share rulesets and crawl budgets.
pub struct RobotsClient<T, R = ParsedRobots> {
    transport: T,
    cache: Arc<RobotsCache<R>>,
    crawl_delay: CrawlDelayConfig,
    default_user_agent: Option<String>,
}

impl RobotsClient<Client> {
    /// Builds a client, its transport and its cache from a configuration
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(RobotsClient)` - Client with a fresh cache
    /// * `Err(reqwest::Error)` - The HTTP client could not be built
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let transport = build_http_client(&config.user_agent, &config.http)?;
        let cache = Arc::new(RobotsCache::with_config(&config.cache));

        Ok(Self::new(transport, cache)
            .with_user_agent(config.user_agent.header_value())
            .with_crawl_delay(config.crawl_delay.clone()))
    }
}

impl<T, R> RobotsClient<T, R>
where
    T: Transport,
    R: Ruleset,
{
    /// Wraps `transport`, storing rulesets in `cache`
    pub fn new(transport: T, cache: Arc<RobotsCache<R>>) -> Self {
        Self {
            transport,
            cache,
            crawl_delay: CrawlDelayConfig::default(),
            default_user_agent: None,
        }
    }

    /// User agent assumed for requests without a `User-Agent` header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.default_user_agent = Some(user_agent.into());
        self
    }

    /// Adjusts the crawl-delays declared by robots.txt
    pub fn with_crawl_delay(mut self, crawl_delay: CrawlDelayConfig) -> Self {
        self.crawl_delay = crawl_delay;
        self
    }

    pub fn cache(&self) -> &Arc<RobotsCache<R>> {
        &self.cache
    }

    /// Sends `request` if robots.txt allows it
    ///
    /// # Request Flow
    ///
    /// 1. Requests for `/robots.txt` itself are sent unchecked
    /// 2. The host's ruleset is taken from the cache, fetched on a miss
    /// 3. A disallowed path is refused with `ClientError::Denied`
    /// 4. With a crawl-delay, the request waits for its turn
    /// 5. The request is forwarded to the transport
    ///
    /// # Returns
    ///
    /// * `Ok(Response)` - The response of the transport
    /// * `Err(ClientError)` - Denied, invalid URL or transport failure
    pub async fn execute(&self, request: Request) -> ClientResult<Response> {
        let url = request.url().clone();
        if url.path() == ROBOTS_PATH {
            return self.forward(request).await;
        }

        let target = HostTarget::from_url(&url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", url, e)))?;
        let key = HostKey::resolve(&target).await;

        let fetcher = RobotsFetcher::new(&self.transport);
        let Some(ruleset) = self.cache.fetch_key(&key, &target, &fetcher).await else {
            return self.forward(request).await;
        };

        let user_agent = self.user_agent_of(&request);
        let path = request_path(&url);
        let grant = ruleset.grant(&user_agent, &path);

        if !grant.allowed {
            tracing::info!(
                "Denied {} for {} by robots.txt ({})",
                url,
                user_agent,
                grant.clause
            );
            return Err(ClientError::Denied {
                path,
                user_agent,
                clause: grant.clause,
            });
        }

        let crawl_delay = self.crawl_delay.effective(grant.crawl_delay);
        self.cache.enter(&user_agent, crawl_delay, &key).await;

        self.forward(request).await
    }

    /// Sends a GET request for `url`
    pub async fn get(&self, url: &str) -> ClientResult<Response> {
        let url =
            Url::parse(url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", url, e)))?;
        self.execute(Request::new(Method::GET, url)).await
    }

    /// Drops every cached ruleset
    ///
    /// Other clients sharing the cache are affected too.
    pub fn close(&self) {
        self.cache.release();
    }

    fn user_agent_of(&self, request: &Request) -> String {
        request
            .headers()
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .or_else(|| self.default_user_agent.clone())
            .unwrap_or_default()
    }

    async fn forward(&self, request: Request) -> ClientResult<Response> {
        Ok(self.transport.execute(request).await?)
    }
}
