// FortiOS API HTTP client
//
// Owns the single session per appliance: HTTP handle (with its cookie
// jar), CSRF token, auth flag, license state and the appliance version.
// All mutable state sits behind one lock that is never held across an
// await. Endpoint operations live in sibling modules as inherent methods
// so this file stays focused on transport mechanics.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, trace};
use url::Url;

use crate::auth::AuthStrategy;
use crate::endpoint::{Endpoint, Scope};
use crate::error::Error;
use crate::license::LicenseState;
use crate::response::{self, Response};
use crate::schema::MkeyField;

/// JSON object sent as the body of cmdb writes.
pub type Payload = Map<String, Value>;

/// Request header carrying the anti-forgery token.
pub const CSRF_HEADER: &str = "X-CSRFTOKEN";

/// Cookie the appliance issues the CSRF token in (`ccsrftoken` or `ccsrftoken_<port>`).
const CSRF_COOKIE: &str = "ccsrftoken";

/// Default wait between triggering a FortiGuard update and re-reading the license.
pub const DEFAULT_LICENSE_RECHECK_DELAY: Duration = Duration::from_secs(17);

/// Whether a call is subject to the invalid-license gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LicenseGate {
    Enforce,
    /// Used by the license check itself so an invalid session can recover.
    Bypass,
}

/// Request body variants used by the endpoint modules.
pub(crate) enum Body<'a> {
    Empty,
    Payload(&'a Payload),
    Json(&'a Value),
    Multipart(reqwest::multipart::Form),
}

/// Cache key for resolved mkey fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SchemaKey {
    pub path: String,
    pub name: String,
    pub scope: Scope,
}

/// Mutable session state, grouped so one lock guards it all.
pub(crate) struct Session {
    pub https: bool,
    pub base_url: Option<Url>,
    pub http: Option<reqwest::Client>,
    pub strategy: Option<AuthStrategy>,
    pub csrf_token: Option<String>,
    pub logged_in: bool,
    pub license: LicenseState,
    pub version: Option<String>,
    pub mkey_fields: HashMap<SchemaKey, Option<MkeyField>>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            https: true,
            base_url: None,
            http: None,
            strategy: None,
            csrf_token: None,
            logged_in: false,
            license: LicenseState::Unknown,
            version: None,
            mkey_fields: HashMap::new(),
        }
    }
}

/// Stateful client for one FortiOS appliance.
///
/// Create with [`FortiClient::new`], open a session with
/// [`login`](Self::login), [`token_login`](Self::token_login) or
/// [`connect`](Self::connect), then use the cmdb / monitor operations.
/// Calls on one client are meant to be issued sequentially: CSRF rotation
/// on a response changes the headers of the next request.
pub struct FortiClient {
    session: RwLock<Session>,
    license_recheck_delay: Duration,
}

impl Default for FortiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FortiClient {
    pub fn new() -> Self {
        Self {
            session: RwLock::new(Session::default()),
            license_recheck_delay: DEFAULT_LICENSE_RECHECK_DELAY,
        }
    }

    /// Use HTTPS (default) or plain HTTP for the next login.
    ///
    /// Plain HTTP is needed on unlicensed / trial appliances.
    pub fn https(self, enabled: bool) -> Self {
        self.set_https(enabled);
        self
    }

    pub fn set_https(&self, enabled: bool) {
        self.write_session().https = enabled;
        debug!(https = enabled, "scheme selected");
    }

    /// Back-off between a FortiGuard update and the license re-check.
    pub fn license_recheck_delay(mut self, delay: Duration) -> Self {
        self.license_recheck_delay = delay;
        self
    }

    pub(crate) fn recheck_delay(&self) -> Duration {
        self.license_recheck_delay
    }

    // ── Session state ────────────────────────────────────────────────

    pub(crate) fn read_session(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_session(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_logged_in(&self) -> bool {
        self.read_session().logged_in
    }

    pub fn auth_strategy(&self) -> Option<AuthStrategy> {
        self.read_session().strategy
    }

    pub fn license_state(&self) -> LicenseState {
        self.read_session().license
    }

    /// The CSRF token currently echoed on every request, if any.
    pub fn csrf_token(&self) -> Option<String> {
        self.read_session().csrf_token.clone()
    }

    /// The appliance base URL (`https://host[:port]`) once a login started.
    pub fn base_url(&self) -> Option<Url> {
        self.read_session().base_url.clone()
    }

    /// Fail unless the session is authenticated and its license not invalid.
    pub fn require_authenticated(&self) -> Result<(), Error> {
        self.check_session(LicenseGate::Enforce)
    }

    pub(crate) fn check_session(&self, gate: LicenseGate) -> Result<(), Error> {
        let session = self.read_session();
        if !session.logged_in {
            return Err(Error::NotLoggedIn);
        }
        if gate == LicenseGate::Enforce && session.license == LicenseState::Invalid {
            return Err(Error::InvalidLicense);
        }
        Ok(())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Absolute URL of `endpoint`; requires an authenticated session.
    pub fn url_for(&self, endpoint: &Endpoint) -> Result<Url, Error> {
        self.gated_url(endpoint, LicenseGate::Enforce)
    }

    fn gated_url(&self, endpoint: &Endpoint, gate: LicenseGate) -> Result<Url, Error> {
        self.check_session(gate)?;
        let url = endpoint.url(&self.require_base_url()?)?;
        trace!(%url, "url built");
        Ok(url)
    }

    pub(crate) fn require_base_url(&self) -> Result<Url, Error> {
        self.read_session()
            .base_url
            .clone()
            .ok_or(Error::NotLoggedIn)
    }

    /// Join an appliance-level path such as `/logincheck` onto the base URL.
    pub(crate) fn appliance_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.require_base_url()?.join(path)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Start a request on the session client with the current CSRF header.
    pub(crate) fn prepare(&self, method: Method, url: Url) -> Result<reqwest::RequestBuilder, Error> {
        let session = self.read_session();
        let http = session.http.as_ref().ok_or(Error::NotLoggedIn)?;
        let builder = http.request(method, url);
        Ok(match session.csrf_token.as_deref() {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        })
    }

    /// Send a prepared request, capture any CSRF rotation, and read the body.
    pub(crate) async fn dispatch(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, Bytes), Error> {
        let resp = builder.send().await?;
        self.capture_csrf(&resp);

        let status = resp.status();
        let body = resp.bytes().await?;
        debug!(%status, "response received");
        trace!(body = %String::from_utf8_lossy(&body), "raw response");
        Ok((status, body))
    }

    /// Issue one API call against `endpoint` and normalize the answer.
    pub(crate) async fn call(
        &self,
        method: Method,
        endpoint: &Endpoint,
        body: Body<'_>,
        gate: LicenseGate,
    ) -> Result<Response, Error> {
        let url = self.gated_url(endpoint, gate)?;
        debug!(%method, %url, "calling FortiOS API");

        let builder = self.prepare(method, url)?;
        let builder = match body {
            Body::Empty => builder,
            Body::Payload(payload) => builder.json(payload),
            Body::Json(value) => builder.json(value),
            Body::Multipart(form) => builder.multipart(form),
        };
        let (status, bytes) = self.dispatch(builder).await?;

        if gate == LicenseGate::Enforce && self.license_state() == LicenseState::Invalid {
            debug!("invalid license detected");
            return Err(Error::InvalidLicense);
        }
        Ok(response::normalize(status, bytes, endpoint.scope()))
    }

    // ── CSRF token management ─────────────────────────────────────────

    /// Install the token from a `ccsrftoken` / `ccsrftoken_*` cookie, if present.
    fn capture_csrf(&self, resp: &reqwest::Response) {
        let token = resp
            .cookies()
            .filter(|c| c.name() == CSRF_COOKIE || c.name().starts_with("ccsrftoken_"))
            .map(|c| strip_wrapping(c.value()).to_owned())
            .last();

        if let Some(token) = token {
            trace!("CSRF token rotated");
            self.write_session().csrf_token = Some(token);
        }
    }
}

/// Drop the first and last characters (the quotes around the cookie value).
pub(crate) fn strip_wrapping(value: &str) -> &str {
    let mut chars = value.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}
