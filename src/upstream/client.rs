use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, HOST};
use reqwest::{Client, Method};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::metrics;
use crate::upstream::error::{looks_like_tls_failure, UpstreamError};
use crate::upstream::target::UpstreamTarget;

const COMPANY_ID_HEADER: &str = "x-com.mcleodsoftware.companyid";

/// Client for the upstream TMS order API. Built once per operation from the
/// validated settings; holds the resolved TLS policy, methods, and headers
/// so the call sites only deal with order ids and payloads.
#[derive(Debug)]
pub struct TmsClient {
    client: Client,
    target: UpstreamTarget,
    fetch_method: Method,
    update_method: Method,
    headers: HeaderMap,
    verify_tls: bool,
}

impl TmsClient {
    pub fn new(settings: &Settings) -> Result<Self, UpstreamError> {
        let missing = settings.missing_required();
        if !missing.is_empty() {
            return Err(UpstreamError::MissingConfig { missing });
        }

        let target = UpstreamTarget::from_settings(settings)?;
        let token = settings.token.as_deref().unwrap_or_default().trim();
        let company_id = settings.company_id.as_deref().unwrap_or_default().trim();

        // Verification defaults on, except when calls are routed to a pinned
        // IP over HTTPS and no explicit toggle was given: hostname checks
        // cannot pass there, so the default flips off. An explicit
        // REQUESTS_VERIFY always wins, either way.
        let verify_tls = match settings.requests_verify {
            Some(explicit) => explicit,
            None => !(target.connect_ip.is_some() && target.is_https()),
        };

        let fetch_method = parse_method(settings.request_method.as_deref(), Method::GET);
        let update_method = parse_method(settings.update_method.as_deref(), Method::PUT);

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Token {token}")).map_err(|_| {
                UpstreamError::InvalidConfig(
                    "TOKEN contains characters not allowed in a header".to_string(),
                )
            })?,
        );
        headers.insert(
            HeaderName::from_static(COMPANY_ID_HEADER),
            HeaderValue::from_str(company_id).map_err(|_| {
                UpstreamError::InvalidConfig(
                    "COMPANY_ID contains characters not allowed in a header".to_string(),
                )
            })?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        // Preserve the real hostname on the wire when routing by IP; an
        // explicit HOST_HEADER wins over the derived one.
        let host_override = settings
            .host_header
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| target.connect_ip.map(|_| target.host.clone()));
        if let Some(host) = host_override {
            headers.insert(
                HOST,
                HeaderValue::from_str(&host).map_err(|_| {
                    UpstreamError::InvalidConfig(
                        "HOST_HEADER contains characters not allowed in a header".to_string(),
                    )
                })?,
            );
        }

        let mut builder = Client::builder()
            .timeout(settings.request_timeout())
            .danger_accept_invalid_certs(!verify_tls);
        if let Some(ip) = target.connect_ip {
            builder = builder.resolve(&target.host, SocketAddr::new(ip, target.port));
        }
        let client = builder
            .build()
            .map_err(|e| UpstreamError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            target,
            fetch_method,
            update_method,
            headers,
            verify_tls,
        })
    }

    pub async fn fetch_order(&self, order_id: &str) -> Result<Value, UpstreamError> {
        metrics::FETCH_REQUESTS.inc();
        let url = self.fetch_url(order_id);
        self.execute(self.fetch_method.clone(), url, None).await
    }

    pub async fn push_order(&self, body: &Value) -> Result<Value, UpstreamError> {
        metrics::PUSH_REQUESTS.inc();
        let url = self.update_url();
        self.execute(self.update_method.clone(), url, Some(body)).await
    }

    /// `<base>/orders/<id>`, unless the base already ends in `/orders`.
    pub fn fetch_url(&self, order_id: &str) -> String {
        let base = &self.target.base_url;
        if base.ends_with("/orders") {
            format!("{base}/{order_id}")
        } else {
            format!("{base}/orders/{order_id}")
        }
    }

    pub fn update_url(&self) -> String {
        format!("{}/orders/update", self.target.base_url)
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn fetch_method(&self) -> &Method {
        &self.fetch_method
    }

    pub fn update_method(&self) -> &Method {
        &self.update_method
    }

    async fn execute(
        &self,
        method: Method,
        url: String,
        body: Option<&Value>,
    ) -> Result<Value, UpstreamError> {
        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(self.headers.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, %url, "calling upstream");
        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            metrics::UPSTREAM_ERRORS.inc();
            self.classify_send_error(e)
        })?;
        let elapsed = started.elapsed();
        metrics::UPSTREAM_LATENCY.observe(elapsed.as_secs_f64());

        let status = response.status();
        debug!(
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "upstream responded"
        );
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::Network(format!("failed to read upstream body: {e}")))?;
        let parsed = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if !status.is_success() {
            metrics::UPSTREAM_ERRORS.inc();
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                body: parsed,
            });
        }

        Ok(parsed)
    }

    fn classify_send_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            return UpstreamError::Network(format!("upstream request timed out: {err}"));
        }
        if looks_like_tls_failure(&err) {
            let hint = self.target.connect_ip.map(|ip| {
                format!(
                    "calls are routed to a pinned IP ({ip}); SNI/hostname verification \
                     typically fails on that path. Unset UPSTREAM_CONNECT_IP or set \
                     REQUESTS_VERIFY=false"
                )
            });
            return UpstreamError::Tls {
                message: err.to_string(),
                hint,
            };
        }
        UpstreamError::Network(err.to_string())
    }
}

fn parse_method(raw: Option<&str>, default: Method) -> Method {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    match Method::from_bytes(raw.to_ascii_uppercase().as_bytes()) {
        Ok(method) => method,
        Err(_) => {
            warn!("unsupported HTTP method override {raw:?}, using {default}");
            default
        }
    }
}
