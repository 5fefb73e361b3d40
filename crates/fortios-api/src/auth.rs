use secrecy::SecretString;

use crate::endpoint::Scope;
use crate::transport::TransportConfig;

/// Which authentication strategy a session was opened with.
///
/// Marker enum (no data) -- the actual secrets live in [`Credentials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// `/logincheck` form login; session cookie + CSRF header.
    Password,
    /// REST API admin token sent as `Authorization: Bearer`.
    Token,
}

/// Secret material for opening a session.
#[derive(Debug, Clone)]
pub enum Credentials {
    Password {
        username: String,
        password: SecretString,
    },
    /// REST API admin token generated on the appliance.
    Token(SecretString),
}

impl Credentials {
    pub fn strategy(&self) -> AuthStrategy {
        match self {
            Self::Password { .. } => AuthStrategy::Password,
            Self::Token(_) => AuthStrategy::Token,
        }
    }
}

/// Everything needed to open one session with an appliance.
///
/// Built by `fortios-config` from a profile, or by hand.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Host name or IP, optionally with a port (`10.40.40.40:8443`).
    pub host: String,
    /// `false` downgrades to plain HTTP (unlicensed / trial appliances).
    pub https: bool,
    pub credentials: Credentials,
    pub transport: TransportConfig,
    /// Scope used for the post-login probe.
    pub scope: Scope,
}
