use crate::url::HostTarget;
use std::fmt;
use std::net::IpAddr;

/// Cache identity of a physical endpoint: scheme, resolved address and port
///
/// Host names that resolve to the same address share one key, and with it one
/// ruleset and one crawl budget. When resolution fails the lower-cased host
/// name stands in for the address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostKey(String);

impl HostKey {
    /// Builds a key from an already known address
    pub fn from_parts(scheme: &str, address: &str, port: u16) -> Self {
        Self(format!("{}://{}:{}", scheme.to_lowercase(), address, port))
    }

    /// Resolves the address of `target` and builds its key
    pub async fn resolve(target: &HostTarget) -> Self {
        let address = match resolve_address(target).await {
            Some(ip) => format_ip(ip),
            None => target.host().to_lowercase(),
        };
        Self::from_parts(target.scheme(), &address, target.port())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Looks up the first address of the target host
async fn resolve_address(target: &HostTarget) -> Option<IpAddr> {
    let host = target.host();
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return Some(ip);
    }

    match tokio::net::lookup_host((host, target.port())).await {
        Ok(mut addrs) => addrs.next().map(|addr| addr.ip()),
        Err(e) => {
            tracing::debug!("DNS lookup failed for {}: {}", host, e);
            None
        }
    }
}

fn format_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    }
}
