// Session login / logout
//
// Two ways in: the `/logincheck` form login (session cookie + CSRF token)
// and REST API admin tokens (bearer header, no login round trip). Both
// finish with a probe that records the appliance version.

use std::sync::Arc;

use reqwest::Method;
use reqwest::cookie::Jar;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::auth::{AuthStrategy, Credentials, SessionConfig};
use crate::client::{Body, FortiClient, LicenseGate};
use crate::endpoint::{Endpoint, Scope};
use crate::error::Error;
use crate::license::LicenseState;
use crate::response::Response;
use crate::transport::TransportConfig;

impl FortiClient {
    /// Open a session from a [`SessionConfig`].
    pub async fn connect(&self, config: &SessionConfig) -> Result<(), Error> {
        self.set_https(config.https);
        match &config.credentials {
            Credentials::Password { username, password } => {
                self.login(
                    &config.host,
                    username,
                    password,
                    &config.transport,
                    &config.scope,
                )
                .await
            }
            Credentials::Token(token) => {
                self.token_login(&config.host, token, &config.transport, &config.scope)
                    .await
            }
        }
    }

    /// Log in with an admin username and password.
    ///
    /// `POST /logincheck` with `username`, `secretkey` and `ajax=1`. The
    /// appliance answers with a body starting with `1` on success and sets
    /// the `ccsrftoken` cookie, which becomes the `X-CSRFTOKEN` header of
    /// every later request. A `monitor/license/status` probe then records
    /// the version; without a version, the probe must at least report
    /// `status: success`.
    pub async fn login(
        &self,
        host: &str,
        username: &str,
        password: &SecretString,
        transport: &TransportConfig,
        scope: &Scope,
    ) -> Result<(), Error> {
        let base_url = self.open_session(host, transport, HeaderMap::new(), AuthStrategy::Password)?;
        let url = base_url.join("/logincheck")?;
        debug!(%url, username, "logging in");

        let builder = self.prepare(Method::POST, url)?.form(&[
            ("username", username),
            ("secretkey", password.expose_secret()),
            ("ajax", "1"),
        ]);
        let (status, body) = self.dispatch(builder).await?;

        if body.first() != Some(&b'1') {
            debug!(%status, "logincheck rejected the credentials");
            return Err(Error::NotLoggedIn);
        }
        self.write_session().logged_in = true;

        let probe = self.probe(self.license_status(scope, LicenseGate::Enforce).await)?;
        let license = LicenseState::from_status(&probe);
        if license != LicenseState::Unknown {
            self.record_license(license);
        }

        match probe.as_decoded() {
            Some(resp) if resp.version.is_some() => {
                self.write_session().version.clone_from(&resp.version);
            }
            Some(resp) if resp.is_success() => {}
            _ => return Err(self.fail_login()),
        }
        debug!("login successful");
        Ok(())
    }

    /// Log in with a REST API admin token.
    ///
    /// Installs `Authorization: Bearer <token>` and marks the session
    /// authenticated without a round trip, then reads `cmdb/system/status`
    /// to record the version. A probe without a version fails the login.
    pub async fn token_login(
        &self,
        host: &str,
        token: &SecretString,
        transport: &TransportConfig,
        scope: &Scope,
    ) -> Result<(), Error> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| Error::InvalidToken(e.to_string()))?;
        bearer.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        self.open_session(host, transport, headers, AuthStrategy::Token)?;
        self.write_session().logged_in = true;
        debug!(host, "token session opened");

        let endpoint = Endpoint::cmdb("system", "status").in_scope(scope.clone());
        let probe = self.probe(
            self.call(Method::GET, &endpoint, Body::Empty, LicenseGate::Enforce)
                .await,
        )?;

        match probe.as_decoded().and_then(|resp| resp.version.clone()) {
            Some(version) => {
                self.write_session().version = Some(version);
                Ok(())
            }
            None => Err(self.fail_login()),
        }
    }

    /// End the session.
    ///
    /// `POST /logout`, then drop the HTTP client and its cookie jar, clear
    /// the CSRF token and reset the license state to `Valid` so the next
    /// login is evaluated afresh. Local state is reset even if the logout
    /// request fails; that failure is still returned.
    pub async fn logout(&self) -> Result<(), Error> {
        let request = self
            .appliance_url("/logout")
            .and_then(|url| self.prepare(Method::POST, url));
        let outcome = match request {
            Ok(builder) => self.dispatch(builder).await.map(drop),
            Err(_) => Ok(()),
        };

        {
            let mut session = self.write_session();
            session.http = None;
            session.base_url = None;
            session.strategy = None;
            session.csrf_token = None;
            session.logged_in = false;
            session.license = LicenseState::Valid;
            session.version = None;
            session.mkey_fields.clear();
        }
        debug!("logged out");
        outcome
    }

    /// The appliance version recorded at login (e.g. `v7.2.5`).
    pub fn version(&self) -> Result<Option<String>, Error> {
        self.require_authenticated()?;
        Ok(self.read_session().version.clone())
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Install a fresh HTTP client (new cookie jar) for `host`.
    fn open_session(
        &self,
        host: &str,
        transport: &TransportConfig,
        headers: HeaderMap,
        strategy: AuthStrategy,
    ) -> Result<Url, Error> {
        let scheme = if self.read_session().https { "https" } else { "http" };
        let base_url = Url::parse(&format!("{scheme}://{host}"))?;
        let jar = Arc::new(Jar::default());
        let http = transport.build_client(&jar, headers)?;

        let mut session = self.write_session();
        session.base_url = Some(base_url.clone());
        session.http = Some(http);
        session.strategy = Some(strategy);
        session.csrf_token = None;
        session.logged_in = false;
        session.version = None;
        session.mkey_fields.clear();
        Ok(base_url)
    }

    /// Unwrap a post-login probe, un-authenticating the session on error.
    fn probe(&self, result: Result<Response, Error>) -> Result<Response, Error> {
        result.map_err(|e| {
            self.write_session().logged_in = false;
            e
        })
    }

    fn fail_login(&self) -> Error {
        debug!("post-login probe returned no usable payload");
        self.write_session().logged_in = false;
        Error::NotLoggedIn
    }
}
