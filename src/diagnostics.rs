//! Reachability probes for operational troubleshooting: is the upstream
//! host resolvable, connectable, handshakable, and answering HTTP? Each
//! probe is independent and reports its own ok/latency so a failure can be
//! pinned to a layer.

use serde::Serialize;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use crate::upstream::error::looks_like_tls_failure;
use crate::upstream::target::UpstreamTarget;

const DNS_TIMEOUT: Duration = Duration::from_secs(5);
const TCP_TIMEOUT: Duration = Duration::from_secs(5);
const TLS_TIMEOUT: Duration = Duration::from_secs(7);
const HTTP_TIMEOUT: Duration = Duration::from_secs(7);
const EGRESS_TIMEOUT: Duration = Duration::from_secs(5);

const EGRESS_ECHO_URL: &str = "https://api.ipify.org";

#[derive(Debug, Serialize)]
pub struct ProbeResult {
    pub ok: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    fn passed(started: Instant, detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            latency_ms: started.elapsed().as_millis() as u64,
            detail: Some(detail.into()),
            error: None,
        }
    }

    fn failed(started: Instant, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            latency_ms: started.elapsed().as_millis() as u64,
            detail: None,
            error: Some(error.into()),
        }
    }
}

pub async fn dns_probe(target: &UpstreamTarget) -> ProbeResult {
    let started = Instant::now();
    let query = format!("{}:{}", target.host, target.port);
    match tokio::time::timeout(DNS_TIMEOUT, tokio::net::lookup_host(query)).await {
        Err(_) => ProbeResult::failed(
            started,
            format!("DNS resolution timed out after {}s", DNS_TIMEOUT.as_secs()),
        ),
        Ok(Err(e)) => ProbeResult::failed(started, format!("DNS resolution failed: {e}")),
        Ok(Ok(addrs)) => {
            let addrs: Vec<String> = addrs.map(|addr| addr.ip().to_string()).collect();
            if addrs.is_empty() {
                ProbeResult::failed(started, "DNS resolution returned no addresses")
            } else {
                ProbeResult::passed(started, addrs.join(", "))
            }
        }
    }
}

/// Connects to the pinned IP when one is configured, otherwise to the
/// upstream hostname (resolving through the OS as the real calls do).
pub async fn tcp_probe(target: &UpstreamTarget) -> ProbeResult {
    let started = Instant::now();
    let addr = match target.connect_ip {
        Some(ip) => SocketAddr::new(ip, target.port).to_string(),
        None => format!("{}:{}", target.host, target.port),
    };
    match tokio::time::timeout(TCP_TIMEOUT, TcpStream::connect(&addr)).await {
        Err(_) => ProbeResult::failed(
            started,
            format!("TCP connect to {addr} timed out after {}s", TCP_TIMEOUT.as_secs()),
        ),
        Ok(Err(e)) => ProbeResult::failed(started, format!("TCP connect to {addr} failed: {e}")),
        Ok(Ok(_stream)) => ProbeResult::passed(started, format!("connected to {addr}")),
    }
}

/// Verification is always ON here, regardless of `REQUESTS_VERIFY`, so
/// certificate problems show up in diagnostics even when the order path
/// runs with verification off.
pub async fn tls_probe(target: &UpstreamTarget) -> ProbeResult {
    let started = Instant::now();
    if !target.is_https() {
        return ProbeResult::passed(started, "not applicable: base URL is not https");
    }

    let client = match probe_client(TLS_TIMEOUT, target) {
        Ok(client) => client,
        Err(e) => return ProbeResult::failed(started, format!("probe client build failed: {e}")),
    };

    match client.get(&target.base_url).send().await {
        Ok(response) => ProbeResult::passed(
            started,
            format!("TLS handshake ok (HTTP {})", response.status().as_u16()),
        ),
        Err(e) if looks_like_tls_failure(&e) => {
            ProbeResult::failed(started, format!("TLS handshake failed: {e}"))
        }
        Err(e) if e.is_timeout() => ProbeResult::failed(
            started,
            format!("TLS probe timed out after {}s", TLS_TIMEOUT.as_secs()),
        ),
        Err(e) => ProbeResult::failed(started, format!("connection failed before TLS: {e}")),
    }
}

/// Any HTTP response counts as reachable, error statuses included; the
/// point is whether the upstream answers at all.
pub async fn http_probe(target: &UpstreamTarget) -> ProbeResult {
    let started = Instant::now();
    let client = match probe_client(HTTP_TIMEOUT, target) {
        Ok(client) => client,
        Err(e) => return ProbeResult::failed(started, format!("probe client build failed: {e}")),
    };

    match client.get(&target.base_url).send().await {
        Ok(response) => {
            ProbeResult::passed(started, format!("HTTP {}", response.status().as_u16()))
        }
        Err(e) if e.is_timeout() => ProbeResult::failed(
            started,
            format!("HTTP probe timed out after {}s", HTTP_TIMEOUT.as_secs()),
        ),
        Err(e) => ProbeResult::failed(started, format!("HTTP probe failed: {e}")),
    }
}

/// Asks a public echo service which IP this process egresses from. Useful
/// when the upstream allowlists caller IPs.
pub async fn egress_ip_probe() -> ProbeResult {
    let started = Instant::now();
    let client = match reqwest::Client::builder().timeout(EGRESS_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => return ProbeResult::failed(started, format!("probe client build failed: {e}")),
    };

    let response = match client.get(EGRESS_ECHO_URL).send().await {
        Ok(response) => response,
        Err(e) => return ProbeResult::failed(started, format!("egress check failed: {e}")),
    };
    match response.text().await {
        Ok(ip) => ProbeResult::passed(started, ip.trim().to_string()),
        Err(e) => ProbeResult::failed(started, format!("egress check failed: {e}")),
    }
}

fn probe_client(timeout: Duration, target: &UpstreamTarget) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(ip) = target.connect_ip {
        builder = builder.resolve(&target.host, SocketAddr::new(ip, target.port));
    }
    builder.build()
}
