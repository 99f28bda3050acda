use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Runtime settings for the bridge, sourced from the environment (plus
/// optional `config/` files, environment wins).
///
/// Everything is optional so the process can start, and the health
/// endpoints can answer, with an incomplete environment. The order
/// operations validate the required values at the point of use and report
/// every missing name at once.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub get_url: Option<String>,
    pub token: Option<String>,
    pub company_id: Option<String>,

    /// HTTP method for the order fetch. Defaults to GET.
    pub request_method: Option<String>,
    /// HTTP method for the order push. Defaults to PUT; POST and PATCH are
    /// the supported alternatives.
    pub update_method: Option<String>,

    pub request_timeout_seconds: Option<u64>,

    /// TLS certificate verification toggle. `None` means "not explicitly
    /// set", which matters for the pinned-IP policy in the upstream client.
    pub requests_verify: Option<bool>,

    /// Fixed IP to connect to instead of resolving the base URL's host.
    pub upstream_connect_ip: Option<String>,
    /// Explicit `Host` header override.
    pub host_header: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config/config").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::default())
            .build()?;

        s.try_deserialize()
    }

    /// Names of required settings that are absent or blank.
    pub fn missing_required(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if is_blank(&self.get_url) {
            missing.push("GET_URL".to_string());
        }
        if is_blank(&self.token) {
            missing.push("TOKEN".to_string());
        }
        if is_blank(&self.company_id) {
            missing.push("COMPANY_ID".to_string());
        }
        missing
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.unwrap_or(15))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).is_none_or(str::is_empty)
}
