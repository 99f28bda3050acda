use std::net::IpAddr;
use url::Url;

use crate::config::Settings;
use crate::upstream::error::UpstreamError;

/// Where upstream calls actually go: the parsed base URL plus the optional
/// pinned connect IP. Shared by the order client and the reachability
/// probes so both interpret `GET_URL`/`UPSTREAM_CONNECT_IP` the same way.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    pub base_url: String,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub connect_ip: Option<IpAddr>,
}

impl UpstreamTarget {
    pub fn from_settings(settings: &Settings) -> Result<Self, UpstreamError> {
        let base = settings
            .get_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| UpstreamError::MissingConfig {
                missing: vec!["GET_URL".to_string()],
            })?;
        let base = base.trim_end_matches('/').to_string();

        let parsed = Url::parse(&base).map_err(|e| {
            UpstreamError::InvalidConfig(format!("GET_URL is not a valid URL: {e}"))
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| UpstreamError::InvalidConfig("GET_URL has no host".to_string()))?
            .to_string();
        let scheme = parsed.scheme().to_string();
        let port = parsed.port_or_known_default().unwrap_or(443);

        let connect_ip = match settings
            .upstream_connect_ip
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(raw) => Some(raw.parse().map_err(|_| {
                UpstreamError::InvalidConfig(format!(
                    "UPSTREAM_CONNECT_IP is not a valid IP address: {raw}"
                ))
            })?),
            None => None,
        };

        Ok(Self {
            base_url: base,
            scheme,
            host,
            port,
            connect_ip,
        })
    }

    pub fn is_https(&self) -> bool {
        self.scheme == "https"
    }
}
