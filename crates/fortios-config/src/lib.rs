//! Profile configuration for FortiOS API sessions.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to [`fortios_api::SessionConfig`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fortios_api::{Credentials, Scope, SessionConfig, TlsMode, TransportConfig};

/// Keyring service under which secrets are stored.
pub const KEYRING_SERVICE: &str = "fortios-api";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{0}' not found")]
    UnknownProfile(String),

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named appliance profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, or the default profile when `name` is `None`.
    ///
    /// Returns the resolved name alongside the profile.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::UnknownProfile(name.into()))
    }

    /// Resolve the named (or default) profile into a ready [`SessionConfig`].
    pub fn session_config(&self, name: Option<&str>) -> Result<SessionConfig, ConfigError> {
        let (name, profile) = self.profile(name)?;
        profile_to_session_config(profile, name, &self.defaults)
    }
}

/// Values applied to every profile that does not override them.
#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_https")]
    pub https: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            insecure: false,
            https: default_https(),
        }
    }
}

fn default_timeout() -> u64 {
    fortios_api::transport::DEFAULT_TIMEOUT.as_secs()
}
fn default_https() -> bool {
    true
}

/// A named appliance profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Host name or IP, optionally with a port (e.g. "10.0.0.1:8443").
    pub host: String,

    /// VDOM name, or "global". Absent means the appliance default.
    pub vdom: Option<String>,

    /// Auth mode: "password" or "token".
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// REST API admin token (plaintext; prefer keyring or env var).
    pub api_token: Option<String>,

    /// Environment variable name containing the API token.
    pub api_token_env: Option<String>,

    /// Override the default scheme; `false` for plain HTTP.
    pub https: Option<bool>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// PEM file with a client certificate and key.
    pub client_cert: Option<PathBuf>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,
}

fn default_auth_mode() -> String {
    "password".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "fortios", "fortios-api").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fortios-api");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(config_path())
}

/// Load Config from `path`, merged over defaults and under `FORTIOS_*`
/// environment variables (`FORTIOS_DEFAULTS__TIMEOUT=30`).
///
/// A missing file is not an error.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path.as_ref()))
        .merge(Env::prefixed("FORTIOS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, config_path())
}

pub fn save_config_to(cfg: &Config, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Look up one secret: named env var, then keyring, then plaintext.
fn resolve_secret(
    env_name: Option<&str>,
    keyring_entry: &str,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    if let Some(val) = env_name.and_then(|name| std::env::var(name).ok()) {
        return Some(SecretString::from(val));
    }

    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, keyring_entry) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    plaintext.map(|s| SecretString::from(s.to_owned()))
}

/// Resolve [`Credentials`] from a profile's `auth_mode` field.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Credentials, ConfigError> {
    let missing = || ConfigError::NoCredentials {
        profile: profile_name.into(),
    };

    match profile.auth_mode.as_str() {
        "password" => {
            let username = profile
                .username
                .clone()
                .or_else(|| std::env::var("FORTIOS_USERNAME").ok())
                .ok_or_else(missing)?;
            let password = resolve_secret(
                profile.password_env.as_deref(),
                &format!("{profile_name}/password"),
                profile.password.as_deref(),
            )
            .ok_or_else(missing)?;
            Ok(Credentials::Password { username, password })
        }
        "token" => resolve_secret(
            profile.api_token_env.as_deref(),
            &format!("{profile_name}/api-token"),
            profile.api_token.as_deref(),
        )
        .map(Credentials::Token)
        .ok_or_else(missing),
        other => Err(ConfigError::Validation {
            field: "auth_mode".into(),
            reason: format!("expected 'password' or 'token', got '{other}'"),
        }),
    }
}

/// Build a [`SessionConfig`] from a profile, filling gaps from `defaults`.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let host = profile.host.trim();
    if host.is_empty() || host.contains("://") {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("expected a host[:port], got '{}'", profile.host),
        });
    }

    let credentials = resolve_credentials(profile, profile_name)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };
    let mut transport = TransportConfig::default()
        .with_tls(tls)
        .with_timeout(Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)));
    if let Some(ref identity) = profile.client_cert {
        transport = transport.with_client_identity(identity.clone());
    }

    Ok(SessionConfig {
        host: host.to_owned(),
        https: profile.https.unwrap_or(defaults.https),
        credentials,
        transport,
        scope: Scope::from(profile.vdom.clone()),
    })
}
