use std::net::Ipv6Addr;
use std::time::Duration;

use url::Host;

use crate::error::ClientError;

/// Debuggee-side transport tuning. Defaults match spec §4.D exactly.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub retry_deadline: Duration,
    pub retry_interval: Duration,
    pub cache_capacity: usize,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Result<Self, ClientError> {
        let server_url = server_url.into();
        validate_localhost(&server_url)?;
        Ok(ClientConfig {
            server_url,
            retry_deadline: Duration::from_secs(60),
            retry_interval: Duration::from_millis(250),
            cache_capacity: 10_000,
        })
    }
}

/// The resolved server URL's host must be `localhost`, `127.0.0.1`, or `::1`.
pub fn validate_localhost(server_url: &str) -> Result<(), ClientError> {
    let parsed = url::Url::parse(server_url).map_err(|_| ClientError::NonLocalhost {
        url: server_url.to_string(),
    })?;
    match parsed.host() {
        Some(Host::Domain("localhost")) => Ok(()),
        Some(Host::Ipv4(addr)) if addr.is_loopback() => Ok(()),
        Some(Host::Ipv6(addr)) if addr == Ipv6Addr::LOCALHOST => Ok(()),
        _ => Err(ClientError::NonLocalhost { url: server_url.to_string() }),
    }
}
