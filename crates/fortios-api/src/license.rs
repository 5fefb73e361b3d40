// License status tracking
//
// The appliance reports its VM license under `monitor/license/status`.
// A session records what it last saw; an `Invalid` record makes every
// gated call fail with `Error::InvalidLicense` until logout.

use reqwest::Method;
use tracing::{debug, warn};

use crate::client::{Body, FortiClient, LicenseGate};
use crate::endpoint::{Endpoint, Scope};
use crate::error::Error;
use crate::response::Response;

/// Last known license validity for the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LicenseState {
    #[default]
    Unknown,
    Valid,
    Invalid,
}

impl LicenseState {
    /// Read the license verdict out of a `license/status` response.
    ///
    /// `Unknown` when the call itself did not succeed.
    pub fn from_status(resp: &Response) -> Self {
        if !resp.is_success() {
            return Self::Unknown;
        }
        let vm_status = resp
            .results()
            .and_then(|r| r.get("vm"))
            .and_then(|vm| vm.get("status"))
            .and_then(|s| s.as_str())
            .map(str::to_ascii_lowercase);

        match vm_status.as_deref() {
            Some("invalid" | "expired") => Self::Invalid,
            _ => Self::Valid,
        }
    }
}

impl FortiClient {
    /// Read `monitor/license/status` without recording anything.
    pub(crate) async fn license_status(
        &self,
        scope: &Scope,
        gate: LicenseGate,
    ) -> Result<Response, Error> {
        let endpoint = Endpoint::monitor("license", "status").in_scope(scope.clone());
        self.call(Method::GET, &endpoint, Body::Empty, gate).await
    }

    /// Check the license and, if it is not reported valid, ask the
    /// appliance to refresh it from FortiGuard and check once more.
    ///
    /// `GET monitor/license/status`, then on failure
    /// `POST monitor/system/fortiguard/update`, a fixed back-off, and a
    /// second `GET`. Returns the last status response and records the
    /// verdict on the session. Runs even when the session license is
    /// already recorded invalid.
    pub async fn check_license(&self, scope: &Scope) -> Result<Response, Error> {
        let first = self.license_status(scope, LicenseGate::Bypass).await?;
        if first.is_success() {
            debug!("license status: success");
            self.record_license(LicenseState::from_status(&first));
            return Ok(first);
        }

        warn!("license not valid, triggering FortiGuard update");
        let endpoint = Endpoint::monitor("system", "fortiguard/update").in_scope(scope.clone());
        let update = self
            .call(Method::POST, &endpoint, Body::Empty, LicenseGate::Bypass)
            .await?;
        if !update.is_success() {
            warn!(http_status = update.http_status(), "FortiGuard update was refused");
            self.record_license(LicenseState::Invalid);
            return Ok(first);
        }

        tokio::time::sleep(self.recheck_delay()).await;
        let second = self.license_status(scope, LicenseGate::Bypass).await?;
        let state = match LicenseState::from_status(&second) {
            LicenseState::Unknown => LicenseState::Invalid,
            known => known,
        };
        debug!(?state, "license status after FortiGuard update");
        self.record_license(state);
        Ok(second)
    }

    pub(crate) fn record_license(&self, state: LicenseState) {
        self.write_session().license = state;
    }
}
