//! Integration tests for the robots-aware client
//!
//! These tests use wiremock to serve robots.txt and pages, and drive
//! `RobotsClient` end-to-end over real HTTP.

use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::{Client, Method, Request, StatusCode, Url};
use robots_warden::config::{Config, CrawlDelayConfig};
use robots_warden::{ClientError, RobotsCache, RobotsClient};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a client with a fresh cache and the given default user agent
fn create_client(user_agent: &str) -> RobotsClient<Client> {
    RobotsClient::new(Client::new(), Arc::new(RobotsCache::new())).with_user_agent(user_agent)
}

/// Serves `body` as robots.txt, expecting exactly `times` fetches
async fn mount_robots(server: &MockServer, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Serves an empty 200 page at `page`, expecting exactly `times` requests
async fn mount_page(server: &MockServer, page: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_disallowed_path_is_denied_without_request() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: bot\nDisallow: /private\n", 1).await;
    mount_page(&server, "/private", 0).await;
    mount_page(&server, "/public", 1).await;

    let client = create_client("bot");

    let error = client
        .get(&format!("{}/private", server.uri()))
        .await
        .expect_err("/private should be denied");
    assert_eq!(error.status(), Some(StatusCode::FORBIDDEN));
    match error {
        ClientError::Denied {
            path,
            user_agent,
            clause,
        } => {
            assert_eq!(path, "/private");
            assert_eq!(user_agent, "bot");
            assert!(clause.contains("/private"), "unexpected clause {}", clause);
        }
        other => panic!("expected a denial, got {:?}", other),
    }

    let response = client
        .get(&format!("{}/public", server.uri()))
        .await
        .expect("/public should be allowed");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_user_agent_header_selects_group() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: bot\nDisallow: /private\n", 1).await;
    mount_page(&server, "/private", 1).await;

    // Default user agent is denied, the header overrides it
    let client = create_client("bot");
    let url = Url::parse(&format!("{}/private", server.uri())).unwrap();

    let mut request = Request::new(Method::GET, url.clone());
    request
        .headers_mut()
        .insert(USER_AGENT, HeaderValue::from_static("OtherBot/2.0"));
    let response = client.execute(request).await.expect("OtherBot is allowed");
    assert_eq!(response.status(), StatusCode::OK);

    let error = client
        .execute(Request::new(Method::GET, url))
        .await
        .expect_err("bot is denied");
    assert!(error.is_denied());
}

#[tokio::test]
async fn test_crawl_delay_spaces_requests() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 1\n", 1).await;
    mount_page(&server, "/page", 2).await;

    let client = create_client("bot");
    let url = format!("{}/page", server.uri());

    let start = Instant::now();
    client.get(&url).await.unwrap();
    client.get(&url).await.unwrap();

    assert!(
        start.elapsed() >= Duration::from_secs(1),
        "second request came after {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_crawl_delay_spaces_concurrent_requests() {
    let server = MockServer::start().await;
    // Concurrent misses may both fetch robots.txt
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 1\n"))
        .expect(1..=2)
        .mount(&server)
        .await;
    mount_page(&server, "/page", 2).await;

    let spacing = Duration::from_secs(1);
    let client = create_client("bot");
    let url = format!("{}/page", server.uri());

    let start = Instant::now();
    let (first, second) = tokio::join!(
        async {
            client.get(&url).await.unwrap();
            start.elapsed()
        },
        async {
            client.get(&url).await.unwrap();
            start.elapsed()
        },
    );

    let quick = [first, second]
        .iter()
        .filter(|elapsed| **elapsed < spacing)
        .count();
    assert_eq!(quick, 1, "finished after {:?} and {:?}", first, second);
    assert!(first.max(second) >= spacing);
    assert!(start.elapsed() >= spacing);
}

#[tokio::test]
async fn test_crawl_delay_is_per_user_agent() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 5\n", 1).await;
    mount_page(&server, "/page", 2).await;

    let cache: Arc<RobotsCache> = Arc::new(RobotsCache::new());
    let first = RobotsClient::new(Client::new(), Arc::clone(&cache)).with_user_agent("first");
    let second = RobotsClient::new(Client::new(), Arc::clone(&cache)).with_user_agent("second");
    let url = format!("{}/page", server.uri());

    let start = Instant::now();
    first.get(&url).await.unwrap();
    second.get(&url).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_default_crawl_delay_applies_without_declared_delay() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /\n", 1).await;
    mount_page(&server, "/page", 2).await;

    let client = create_client("bot").with_crawl_delay(CrawlDelayConfig {
        default: Some(1),
        override_delay: None,
    });
    let url = format!("{}/page", server.uri());

    let start = Instant::now();
    client.get(&url).await.unwrap();
    client.get(&url).await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_override_crawl_delay_replaces_declared_delay() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 30\n", 1).await;
    mount_page(&server, "/page", 2).await;

    let client = create_client("bot").with_crawl_delay(CrawlDelayConfig {
        default: None,
        override_delay: Some(1),
    });
    let url = format!("{}/page", server.uri());

    let start = Instant::now();
    client.get(&url).await.unwrap();
    client.get(&url).await.unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(30));
}

#[tokio::test]
async fn test_robots_fetched_once_per_host() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /admin\n", 1).await;
    mount_page(&server, "/a", 1).await;
    mount_page(&server, "/b", 1).await;
    mount_page(&server, "/c", 1).await;

    let client = create_client("bot");
    for page in ["/a", "/b", "/c"] {
        client.get(&format!("{}{}", server.uri(), page)).await.unwrap();
    }

    assert_eq!(client.cache().len(), 1);
}

#[tokio::test]
async fn test_shared_cache_across_clients() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /\n", 1).await;
    mount_page(&server, "/page", 2).await;

    let cache: Arc<RobotsCache> = Arc::new(RobotsCache::new());
    let first = RobotsClient::new(Client::new(), Arc::clone(&cache));
    let second = RobotsClient::new(Client::new(), Arc::clone(&cache));
    let url = format!("{}/page", server.uri());

    first.get(&url).await.unwrap();
    second.get(&url).await.unwrap();
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/private", 2).await;

    let client = create_client("bot").with_crawl_delay(CrawlDelayConfig {
        default: None,
        override_delay: Some(60),
    });
    let url = format!("{}/private", server.uri());

    // No ruleset means no throttling either
    let start = Instant::now();
    client.get(&url).await.unwrap();
    client.get(&url).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(60));
}

#[tokio::test]
async fn test_robots_request_is_not_intercepted() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /\n", 1).await;

    let client = create_client("bot");
    let response = client
        .get(&format!("{}/robots.txt", server.uri()))
        .await
        .expect("robots.txt is always reachable");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn test_close_releases_cache() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /\n", 2).await;
    mount_page(&server, "/page", 2).await;

    let client = create_client("bot");
    let url = format!("{}/page", server.uri());

    client.get(&url).await.unwrap();
    assert_eq!(client.cache().len(), 1);

    client.close();
    assert!(client.cache().is_empty());

    // The next request fetches robots.txt again
    client.get(&url).await.unwrap();
}

#[tokio::test]
async fn test_client_from_config() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: WardenBot\nDisallow: /\n", 1).await;
    mount_page(&server, "/page", 0).await;

    let config: Config = toml::from_str(
        r#"
[user-agent]
crawler-name = "WardenBot"
crawler-version = "1.0"
contact-url = "https://example.com/bot"
contact-email = "bot@example.com"
"#,
    )
    .unwrap();

    let client = RobotsClient::from_config(&config).unwrap();
    let error = client
        .get(&format!("{}/page", server.uri()))
        .await
        .expect_err("WardenBot is disallowed everywhere");

    match error {
        ClientError::Denied { user_agent, .. } => {
            assert_eq!(
                user_agent,
                "WardenBot/1.0 (+https://example.com/bot; bot@example.com)"
            );
        }
        other => panic!("expected a denial, got {:?}", other),
    }
}
