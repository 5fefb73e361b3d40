// Transport configuration for building the session's reqwest::Client.
//
// TLS policy, client identity, and the fixed per-session timeout all land
// here. A fresh cookie jar is created every time a session client is built,
// so logging out and back in never reuses stale cookies.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;

use crate::error::Error;

/// Timeout applied when the caller does not choose one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

/// TLS verification mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (factory self-signed appliances).
    DangerAcceptInvalid,
}

/// Transport settings for one session.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    /// PEM file holding the client certificate and its private key.
    pub client_identity: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: DEFAULT_TIMEOUT,
            client_identity: None,
        }
    }
}

impl TransportConfig {
    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_client_identity(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_identity = Some(path.into());
        self
    }

    /// Build a `reqwest::Client` bound to `jar`, with optional default headers.
    ///
    /// Token sessions pass the `Authorization` header here; credential
    /// sessions pass an empty map and rely on the jar.
    pub(crate) fn build_client(
        &self,
        jar: &Arc<Jar>,
        headers: HeaderMap,
    ) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("fortios-api/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .cookie_provider(Arc::clone(jar));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        if let Some(ref path) = self.client_identity {
            let pem = std::fs::read(path)
                .map_err(|e| Error::Tls(format!("failed to read client certificate: {e}")))?;
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| Error::Tls(format!("invalid client certificate: {e}")))?;
            builder = builder.identity(identity);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}
