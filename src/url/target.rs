use crate::robots::ROBOTS_PATH;
use crate::UrlError;
use std::fmt;
use url::Url;

/// The scheme, host and port a request is addressed to
///
/// The host is kept as written in the URL (lower-cased by URL parsing) so the
/// robots document can be requested by name, which matters for virtual
/// hosting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostTarget {
    scheme: String,
    host: String,
    port: u16,
}

impl HostTarget {
    /// Creates a target from its parts
    pub fn new(scheme: &str, host: &str, port: u16) -> Self {
        Self {
            scheme: scheme.to_lowercase(),
            host: host.to_lowercase(),
            port,
        }
    }

    /// Extracts the target of a URL
    ///
    /// # Arguments
    ///
    /// * `url` - An absolute HTTP(S) URL
    ///
    /// # Returns
    ///
    /// * `Ok(HostTarget)` - The target, with the scheme's default port if none is given
    /// * `Err(UrlError)` - The URL is not HTTP(S) or has no host
    ///
    /// # Examples
    ///
    /// ```
    /// use url::Url;
    /// use robots_warden::url::HostTarget;
    ///
    /// let url = Url::parse("https://Example.COM/path").unwrap();
    /// let target = HostTarget::from_url(&url).unwrap();
    /// assert_eq!(target.host(), "example.com");
    /// assert_eq!(target.port(), 443);
    /// ```
    pub fn from_url(url: &Url) -> Result<Self, UrlError> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                scheme
            )));
        }

        let host = url.host_str().ok_or(UrlError::MissingDomain)?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| UrlError::Malformed(format!("No port for {}", url)))?;

        Ok(Self::new(scheme, host, port))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL of the robots document for this target
    pub fn robots_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "{}://{}:{}{}",
            self.scheme, self.host, self.port, ROBOTS_PATH
        ))
    }
}

impl fmt::Display for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
