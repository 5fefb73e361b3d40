// Configuration (cmdb) operations
//
// Raw verbs over `/api/v2/cmdb/<path>/<name>[/<mkey>]` plus `set`, the
// idempotent "make this object look like this" primitive built on them.

use reqwest::Method;
use tracing::{debug, warn};

use crate::client::{Body, FortiClient, LicenseGate, Payload};
use crate::endpoint::{Endpoint, MovePosition};
use crate::error::Error;
use crate::response::Response;
use crate::schema::mkey_to_string;

/// `http_status` values of a failed update that `set` retries as a create.
///
/// 404: nothing to update yet. 405: the item path does not accept PUT.
/// 500: the appliance's answer for a missing parent entry.
pub const CREATE_FALLBACK_STATUSES: [u16; 3] = [404, 405, 500];

impl FortiClient {
    /// Read configuration. Values are under `results`.
    ///
    /// `GET /api/v2/cmdb/<path>/<name>[/<mkey>]`
    pub async fn get(&self, endpoint: &Endpoint) -> Result<Response, Error> {
        self.call(Method::GET, endpoint, Body::Empty, LicenseGate::Enforce)
            .await
    }

    /// Create an object. Fails on the appliance side if it already exists.
    ///
    /// `POST /api/v2/cmdb/<path>/<name>` -- always the collection path.
    /// When `endpoint` carries an mkey it is written into the payload under
    /// the table's mkey name (overriding any value already there, as a
    /// number for integer-keyed tables); the item
    /// path would 404 because the entry does not exist yet.
    pub async fn post(&self, endpoint: &Endpoint, data: &Payload) -> Result<Response, Error> {
        let mut data = data.clone();
        if let Some(mkey) = endpoint.mkey() {
            let mkey_field = self
                .mkey_field(endpoint.path(), endpoint.name(), endpoint.scope())
                .await?;
            match mkey_field {
                Some(field) => {
                    let current = data.get(&field.name).and_then(mkey_to_string);
                    if current.as_deref() != Some(mkey) {
                        debug!(field = %field.name, mkey, "forcing mkey into POST payload");
                        let value = field.value_for(mkey);
                        data.insert(field.name, value);
                    }
                }
                None => debug!(mkey, "no mkey field to force, sending payload as-is"),
            }
        }

        let collection = endpoint.collection();
        self.call(
            Method::POST,
            &collection,
            Body::Payload(&data),
            LicenseGate::Enforce,
        )
        .await
    }

    /// Update an existing object.
    ///
    /// `PUT /api/v2/cmdb/<path>/<name>/<mkey>`; without an explicit mkey the
    /// value is looked up in `data` through the table schema.
    pub async fn put(&self, endpoint: &Endpoint, data: &Payload) -> Result<Response, Error> {
        let target = self.resolve_item(endpoint, Some(data)).await?;
        self.call(
            Method::PUT,
            &target,
            Body::Payload(data),
            LicenseGate::Enforce,
        )
        .await
    }

    /// Delete an object.
    ///
    /// `DELETE /api/v2/cmdb/<path>/<name>/<mkey>`; mkey resolution as for
    /// [`put`](Self::put). `data`, when given, is also sent as the body.
    pub async fn delete(
        &self,
        endpoint: &Endpoint,
        data: Option<&Payload>,
    ) -> Result<Response, Error> {
        let target = self.resolve_item(endpoint, data).await?;
        let body = data.map_or(Body::Empty, Body::Payload);
        self.call(Method::DELETE, &target, body, LicenseGate::Enforce)
            .await
    }

    /// Reorder a table entry (firewall policies, for example).
    ///
    /// `PUT /api/v2/cmdb/<path>/<name>/<mkey>?action=move&<before|after>=<reference>`
    pub async fn move_entry(
        &self,
        endpoint: &Endpoint,
        position: MovePosition,
        reference: &str,
    ) -> Result<Response, Error> {
        let target = endpoint
            .clone()
            .with_param("action", "move")
            .with_param(position.as_param(), reference);
        self.call(Method::PUT, &target, Body::Empty, LicenseGate::Enforce)
            .await
    }

    /// Ensure an object holds `data`: update it, or create it when there is
    /// nothing to update.
    ///
    /// The mkey comes from `endpoint` if set, otherwise from `data` via the
    /// table schema. The PUT result is returned unchanged unless its
    /// `http_status` is in [`CREATE_FALLBACK_STATUSES`], in which case the
    /// result of a POST with the same mkey and payload is returned instead.
    pub async fn set(&self, endpoint: &Endpoint, data: &Payload) -> Result<Response, Error> {
        let target = self.resolve_item(endpoint, Some(data)).await?;
        let updated = self
            .call(
                Method::PUT,
                &target,
                Body::Payload(data),
                LicenseGate::Enforce,
            )
            .await?;

        if CREATE_FALLBACK_STATUSES.contains(&updated.http_status()) {
            warn!(
                %target,
                http_status = updated.http_status(),
                "update failed, creating the object instead"
            );
            return self.post(&target, data).await;
        }
        Ok(updated)
    }

    /// Fill in the endpoint's mkey from `data` when the caller left it out.
    async fn resolve_item(
        &self,
        endpoint: &Endpoint,
        data: Option<&Payload>,
    ) -> Result<Endpoint, Error> {
        if endpoint.mkey().is_some() {
            return Ok(endpoint.clone());
        }
        let Some(data) = data else {
            return Ok(endpoint.clone());
        };
        let mkey = self
            .mkey(endpoint.path(), endpoint.name(), data, endpoint.scope())
            .await?;
        Ok(endpoint.clone().with_mkey_opt(mkey))
    }
}
