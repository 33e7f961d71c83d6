//! URL handling module for robots-warden
//!
//! This module turns request URLs into the two identities the robots layer
//! works with:
//!
//! - `HostTarget`: scheme, host name and port, used to fetch robots.txt
//! - `HostKey`: scheme, resolved address and port, used as the cache key

mod host_key;
mod target;

pub use host_key::HostKey;
pub use target::HostTarget;

use url::Url;

/// Path and query of a URL, the part robots.txt rules are matched against
///
/// # Examples
///
/// ```
/// use url::Url;
/// use robots_warden::url::request_path;
///
/// let url = Url::parse("https://example.com/search?q=rust#top").unwrap();
/// assert_eq!(request_path(&url), "/search?q=rust");
/// ```
pub fn request_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
