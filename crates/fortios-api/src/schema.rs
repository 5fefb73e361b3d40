// Schema queries and identity-key (mkey) resolution
//
// The appliance describes every cmdb table through `?action=schema`. The
// only parts this client needs are `mkey`, the name of the field that
// identifies a table entry, and `mkey_type`. Absence is a normal answer: singleton objects
// such as `system/global` have no mkey.

use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{Body, FortiClient, LicenseGate, Payload, SchemaKey};
use crate::endpoint::{Endpoint, Scope, Surface};
use crate::error::Error;

/// The identity-key field of a table, as declared by its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MkeyField {
    pub name: String,
    /// `mkey_type: integer`; forced values are sent as JSON numbers.
    pub integer: bool,
}

impl MkeyField {
    fn from_schema(schema: &Value) -> Option<Self> {
        let name = schema.get("mkey").and_then(Value::as_str)?;
        let integer = schema.get("mkey_type").and_then(Value::as_str) == Some("integer");
        Some(Self {
            name: name.to_owned(),
            integer,
        })
    }

    /// JSON value to store `mkey` under this field.
    pub fn value_for(&self, mkey: &str) -> Value {
        match mkey.parse::<u64>() {
            Ok(n) if self.integer => Value::from(n),
            _ => Value::String(mkey.to_owned()),
        }
    }
}

/// One table in the cmdb catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CmdbTable {
    pub path: String,
    pub name: String,
}

impl FortiClient {
    /// Fetch the schema body (`results`) of the table behind `endpoint`.
    ///
    /// Returns `None` when the appliance does not answer with HTTP 200 or
    /// the body carries no `results`.
    pub async fn schema(&self, endpoint: &Endpoint) -> Result<Option<Value>, Error> {
        let resp = self
            .call(
                Method::GET,
                &endpoint.schema(),
                Body::Empty,
                LicenseGate::Enforce,
            )
            .await?;

        if resp.http_status() != 200 {
            debug!(%endpoint, http_status = resp.http_status(), "schema query refused");
            return Ok(None);
        }
        Ok(resp.results().cloned())
    }

    /// Name of the identity-key field of the `path/name` table.
    ///
    /// `None` (with a warning) when the schema defines no mkey, or when the
    /// schema query is refused. Only answers from a successful schema query
    /// are cached, per `(path, name, scope)` until the next login or logout.
    pub async fn mkey_name(
        &self,
        path: &str,
        name: &str,
        scope: &Scope,
    ) -> Result<Option<String>, Error> {
        Ok(self
            .mkey_field(path, name, scope)
            .await?
            .map(|field| field.name))
    }

    pub(crate) async fn mkey_field(
        &self,
        path: &str,
        name: &str,
        scope: &Scope,
    ) -> Result<Option<MkeyField>, Error> {
        let key = SchemaKey {
            path: path.to_owned(),
            name: name.to_owned(),
            scope: scope.clone(),
        };
        if let Some(cached) = self.read_session().mkey_fields.get(&key) {
            return Ok(cached.clone());
        }

        let endpoint = Endpoint::cmdb(path, name).in_scope(scope.clone());
        let Some(schema) = self.schema(&endpoint).await? else {
            warn!("schema for {path}/{name} unavailable, mkey unknown");
            return Ok(None);
        };

        let field = MkeyField::from_schema(&schema);
        if field.is_none() {
            warn!("there is no mkey for {path}/{name}");
        }
        self.write_session()
            .mkey_fields
            .insert(key, field.clone());
        Ok(field)
    }

    /// Value of the identity key inside `data`, rendered as a string.
    ///
    /// `None` when the table has no mkey or `data` does not carry it.
    pub async fn mkey(
        &self,
        path: &str,
        name: &str,
        data: &Payload,
        scope: &Scope,
    ) -> Result<Option<String>, Error> {
        let Some(mkey_name) = self.mkey_name(path, name, scope).await? else {
            return Ok(None);
        };

        let value = data.get(&mkey_name).and_then(mkey_to_string);
        if value.is_none() {
            warn!(mkey = %mkey_name, "mkey not set in the data for {path}/{name}");
        }
        Ok(value)
    }

    /// Every `(path, name)` table of the cmdb, from `/api/v2/cmdb/?action=schema`.
    ///
    /// Internal `__tree__` entries are skipped.
    pub async fn cmdb_tables(&self, scope: &Scope) -> Result<Vec<CmdbTable>, Error> {
        let endpoint = Endpoint::catalog(Surface::Cmdb)
            .in_scope(scope.clone())
            .with_param("action", "schema");
        let resp = self
            .call(Method::GET, &endpoint, Body::Empty, LicenseGate::Enforce)
            .await?
            .into_decoded()?;

        let entries: Vec<CmdbTable> = match resp.results {
            Some(results) => {
                serde_json::from_value(results).map_err(|e| Error::MalformedResponse {
                    message: format!("unexpected cmdb catalog shape: {e}"),
                    body: String::new(),
                })?
            }
            None => Vec::new(),
        };

        Ok(entries
            .into_iter()
            .filter(|t| !t.path.contains("__tree__"))
            .collect())
    }
}

/// Render an mkey value for URL use; strings as-is, numbers in decimal.
pub(crate) fn mkey_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
