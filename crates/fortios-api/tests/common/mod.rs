#![allow(dead_code, clippy::unwrap_used)]
// Shared wiremock fixtures for the FortiOS client integration tests.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::subscriber::DefaultGuard;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fortios_api::{FortiClient, Payload, Scope, TransportConfig};

pub const CSRF: &str = "CSRF-TOKEN-1";
pub const VERSION: &str = "v7.2.5";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Plain-HTTP client with no license back-off, pointed at nothing yet.
pub fn client() -> FortiClient {
    init_tracing();
    FortiClient::new()
        .https(false)
        .license_recheck_delay(Duration::ZERO)
}

pub fn host(server: &MockServer) -> String {
    server.address().to_string()
}

/// `{ "http_status": status, "status": ..., ..extra }`
pub fn envelope(status: u16, extra: &Value) -> Value {
    let mut body = json!({
        "http_status": status,
        "status": if status == 200 { "success" } else { "error" },
    });
    if let (Some(target), Some(fields)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
    }
    body
}

pub fn reply(status: u16, extra: &Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(envelope(status, extra))
}

pub fn payload(value: &Value) -> Payload {
    value.as_object().unwrap().clone()
}

pub async fn mount_logincheck(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/logincheck"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Set-Cookie", "APSCOOKIE_9999=\"0%260\"; path=/")
                .append_header("Set-Cookie", format!("ccsrftoken=\"{CSRF}\"; path=/").as_str())
                .set_body_string("1document.location=\"/ng/prompt?viewOnly&redir=%2Fng%2F\";\n"),
        )
        .mount(server)
        .await;
}

pub async fn mount_license_status(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v2/monitor/license/status"))
        .respond_with(reply(
            200,
            &json!({
                "version": VERSION,
                "serial": "FGVM02TM00000000",
                "results": { "vm": { "status": "valid" } }
            }),
        ))
        .mount(server)
        .await;
}

/// A client logged in with username/password against `server`.
pub async fn logged_in(server: &MockServer) -> FortiClient {
    mount_logincheck(server).await;
    mount_license_status(server).await;

    let client = client();
    let password = "s3cret".to_owned().into();
    client
        .login(
            &host(server),
            "admin",
            &password,
            &TransportConfig::default(),
            &Scope::vdom("root"),
        )
        .await
        .unwrap();
    client
}

/// Schema answer for `path/name`, optionally defining a string mkey field.
pub async fn mount_schema(server: &MockServer, table: &str, mkey: Option<&str>) {
    mount_typed_schema(server, table, mkey.map(|m| (m, "string"))).await;
}

/// Schema answer for `path/name` with an mkey field of the given `mkey_type`.
pub async fn mount_typed_schema(server: &MockServer, table: &str, mkey: Option<(&str, &str)>) {
    let mut results = json!({ "name": table, "category": "table" });
    if let Some((mkey, mkey_type)) = mkey {
        results["mkey"] = json!(mkey);
        results["mkey_type"] = json!(mkey_type);
    }
    Mock::given(method("GET"))
        .and(path(format!("/api/v2/cmdb/{table}")))
        .and(query_param("action", "schema"))
        .respond_with(reply(200, &json!({ "results": results })))
        .mount(server)
        .await;
}

// ── Log capture ─────────────────────────────────────────────────────

/// In-memory sink for formatted tracing output.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route `WARN` and above on this thread into a buffer until the guard drops.
///
/// `#[tokio::test]` runs on a current-thread runtime, so every event of the
/// test body lands here.
pub fn capture_warnings() -> (LogBuffer, DefaultGuard) {
    let logs = LogBuffer::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || sink.clone())
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}
