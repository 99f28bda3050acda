use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("missing required configuration: {missing:?}")]
    MissingConfig { missing: Vec<String> },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Upstream answered with a non-2xx status. The body is JSON-parsed on
    /// a best-effort basis, raw text otherwise.
    #[error("upstream returned HTTP {status}")]
    Http { status: u16, body: serde_json::Value },

    #[error("TLS failure: {message}")]
    Tls {
        message: String,
        hint: Option<String>,
    },

    #[error("network error: {0}")]
    Network(String),
}

/// Walks the error source chain looking for handshake/certificate markers.
/// reqwest does not expose the TLS layer directly, so this is the practical
/// way to tell a certificate problem apart from a refused connection.
pub(crate) fn looks_like_tls_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        let text = current.to_string().to_ascii_lowercase();
        if text.contains("certificate")
            || text.contains("handshake")
            || text.contains("tls")
            || text.contains("ssl")
        {
            return true;
        }
        source = current.source();
    }
    false
}
