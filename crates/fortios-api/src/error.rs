use thiserror::Error;

/// Top-level error type for the `fortios-api` crate.
///
/// Identity-key absence is not an error: schema lookups return `Option`
/// and callers decide. Every variant here aborts the current operation.
#[derive(Debug, Error)]
pub enum Error {
    // ── Session ─────────────────────────────────────────────────────
    /// No authenticated session, or login failed its success marker / probe.
    #[error("Not logged in -- call login() or token_login() first")]
    NotLoggedIn,

    /// The appliance license was recorded as invalid for this session.
    #[error("Invalid license on the appliance")]
    InvalidLicense,

    /// The API token cannot be sent as an HTTP header value.
    #[error("Invalid API token: {0}")]
    InvalidToken(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup error (trust store, client identity, client build).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// The body could not be decoded as the `{http_status, status, ...}` envelope.
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String, body: String },

    /// Local IO failure (reading a file to upload, a certificate, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if re-authenticating might resolve this error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::NotLoggedIn | Self::InvalidToken(_))
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
