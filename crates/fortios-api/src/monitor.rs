// Monitoring operations
//
// Runtime state, operational actions and file transfer over
// `/api/v2/monitor/<path>/<name>`.

use std::path::Path;

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::debug;

use crate::client::{Body, FortiClient, LicenseGate};
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::response::{RawResponse, Response};

/// A file sent through [`FortiClient::upload`].
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Multipart field name the endpoint expects (usually `file`).
    pub field: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// Read `path` from disk, using its file name as the upload name.
    pub fn from_path(field: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(field, file_name, content))
    }
}

impl FortiClient {
    /// Read runtime state. Values are under `results`.
    ///
    /// `GET /api/v2/monitor/<path>/<name>[/<mkey>]`
    pub async fn monitor(&self, endpoint: &Endpoint) -> Result<Response, Error> {
        self.call(Method::GET, endpoint, Body::Empty, LicenseGate::Enforce)
            .await
    }

    /// Run an operational action on the appliance (not a config change).
    ///
    /// `POST /api/v2/monitor/<path>/<name>`, e.g. `system/fortiguard/update`
    /// or `system/config/backup`.
    pub async fn execute(
        &self,
        endpoint: &Endpoint,
        data: Option<&Value>,
    ) -> Result<Response, Error> {
        let body = data.map_or(Body::Empty, Body::Json);
        self.call(Method::POST, endpoint, body, LicenseGate::Enforce)
            .await
    }

    /// Download a file-producing monitor endpoint (config backup, logs).
    ///
    /// The body is returned as-is; it is usually not a JSON envelope.
    /// Typical parameters: `scope=global`, `destination=file`.
    pub async fn download(&self, endpoint: &Endpoint) -> Result<RawResponse, Error> {
        let url = self.url_for(endpoint)?;
        debug!(%url, "downloading");
        let builder = self.prepare(Method::GET, url)?;
        let (status, body) = self.dispatch(builder).await?;
        Ok(RawResponse {
            http_status: status.as_u16(),
            body,
        })
    }

    /// Upload a file (license, certificate, config restore).
    ///
    /// Multipart `POST /api/v2/monitor/<path>/<name>` with `file` plus any
    /// extra text `fields`.
    pub async fn upload(
        &self,
        endpoint: &Endpoint,
        file: UploadFile,
        fields: &[(&str, &str)],
    ) -> Result<Response, Error> {
        debug!(%endpoint, file = %file.file_name, "uploading");
        let mut form = Form::new();
        for (key, value) in fields {
            form = form.text((*key).to_owned(), (*value).to_owned());
        }
        let part = Part::bytes(file.content).file_name(file.file_name);
        form = form.part(file.field, part);

        self.call(
            Method::POST,
            endpoint,
            Body::Multipart(form),
            LicenseGate::Enforce,
        )
        .await
    }
}
