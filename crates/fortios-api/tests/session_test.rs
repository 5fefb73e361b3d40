#![allow(clippy::unwrap_used)]
// Integration tests for login, logout, CSRF handling and license checks
// against a wiremock appliance.

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{CSRF, VERSION, client, host, logged_in, mount_license_status, reply};
use fortios_api::{
    AuthStrategy, Credentials, Endpoint, Error, LicenseState, Scope, SessionConfig,
    TransportConfig,
};

// ── Password login tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_records_version_and_csrf_token() {
    let server = MockServer::start().await;
    let client = logged_in(&server).await;

    assert!(client.is_logged_in());
    client.require_authenticated().unwrap();
    assert_eq!(client.auth_strategy(), Some(AuthStrategy::Password));
    assert_eq!(client.csrf_token().as_deref(), Some(CSRF));
    assert_eq!(client.version().unwrap().as_deref(), Some(VERSION));
    assert_eq!(client.license_state(), LicenseState::Valid);
}

#[tokio::test]
async fn test_login_posts_form_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/logincheck"))
        .and(body_string_contains("username=admin"))
        .and(body_string_contains("secretkey=s3cret"))
        .and(body_string_contains("ajax=1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("1"))
        .expect(1)
        .mount(&server)
        .await;
    mount_license_status(&server).await;

    let client = client();
    client
        .login(
            &host(&server),
            "admin",
            &"s3cret".to_owned().into(),
            &TransportConfig::default(),
            &Scope::Default,
        )
        .await
        .unwrap();

    assert!(client.is_logged_in());
    // No ccsrftoken cookie was set, so no header is echoed.
    assert_eq!(client.csrf_token(), None);
}

#[tokio::test]
async fn test_login_rejected_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/logincheck"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/monitor/license/status"))
        .respond_with(reply(200, &json!({ "version": VERSION })))
        .expect(0)
        .mount(&server)
        .await;

    let client = client();
    let result = client
        .login(
            &host(&server),
            "admin",
            &"wrong".to_owned().into(),
            &TransportConfig::default(),
            &Scope::Default,
        )
        .await;

    assert!(matches!(result, Err(Error::NotLoggedIn)));
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_login_accepts_successful_probe_without_version() {
    let server = MockServer::start().await;
    common::mount_logincheck(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/monitor/license/status"))
        .respond_with(reply(200, &json!({ "results": {} })))
        .mount(&server)
        .await;

    let client = client();
    client
        .login(
            &host(&server),
            "admin",
            &"s3cret".to_owned().into(),
            &TransportConfig::default(),
            &Scope::Default,
        )
        .await
        .unwrap();

    assert!(client.is_logged_in());
    assert_eq!(client.version().unwrap(), None);
}

#[tokio::test]
async fn test_login_fails_when_probe_is_unusable() {
    let server = MockServer::start().await;
    common::mount_logincheck(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/monitor/license/status"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client();
    let result = client
        .login(
            &host(&server),
            "admin",
            &"s3cret".to_owned().into(),
            &TransportConfig::default(),
            &Scope::Default,
        )
        .await;

    assert!(matches!(result, Err(Error::NotLoggedIn)));
    assert!(!client.is_logged_in());
}

// ── CSRF tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_csrf_header_sent_after_login() {
    let server = MockServer::start().await;
    let client = logged_in(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/cmdb/system/global"))
        .and(header("X-CSRFTOKEN", CSRF))
        .respond_with(reply(200, &json!({ "results": { "hostname": "fw1" } })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client
        .get(&Endpoint::cmdb("system", "global"))
        .await
        .unwrap();
    assert!(resp.is_success());
    assert_eq!(resp.results().unwrap()["hostname"], "fw1");
}

#[tokio::test]
async fn test_csrf_token_rotates_from_port_cookie() {
    let server = MockServer::start().await;
    let client = logged_in(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/monitor/system/status"))
        .respond_with(
            reply(200, &json!({ "results": {} }))
                .append_header("Set-Cookie", "ccsrftoken_8443=\"ROTATED\"; path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/cmdb/system/interface"))
        .and(header("X-CSRFTOKEN", "ROTATED"))
        .respond_with(reply(200, &json!({ "results": [] })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .monitor(&Endpoint::monitor("system", "status"))
        .await
        .unwrap();
    assert_eq!(client.csrf_token().as_deref(), Some("ROTATED"));

    let resp = client
        .get(&Endpoint::cmdb("system", "interface"))
        .await
        .unwrap();
    assert!(resp.is_success());
}

// ── Token login tests ───────────────────────────────────────────────

#[tokio::test]
async fn test_token_login_sends_bearer_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/cmdb/system/status"))
        .and(header("Authorization", "Bearer tok-123"))
        .and(query_param("vdom", "root"))
        .respond_with(reply(200, &json!({ "version": "v7.4.1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/logincheck"))
        .respond_with(ResponseTemplate::new(200).set_body_string("1"))
        .expect(0)
        .mount(&server)
        .await;

    let client = client();
    client
        .token_login(
            &host(&server),
            &"tok-123".to_owned().into(),
            &TransportConfig::default(),
            &Scope::vdom("root"),
        )
        .await
        .unwrap();

    assert!(client.is_logged_in());
    assert_eq!(client.auth_strategy(), Some(AuthStrategy::Token));
    assert_eq!(client.version().unwrap().as_deref(), Some("v7.4.1"));
}

#[tokio::test]
async fn test_token_login_without_version_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/cmdb/system/status"))
        .respond_with(reply(401, &json!({})))
        .mount(&server)
        .await;

    let client = client();
    let result = client
        .token_login(
            &host(&server),
            &"expired".to_owned().into(),
            &TransportConfig::default(),
            &Scope::Default,
        )
        .await;

    assert!(matches!(result, Err(Error::NotLoggedIn)));
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_connect_dispatches_on_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/cmdb/system/status"))
        .and(header("Authorization", "Bearer from-config"))
        .respond_with(reply(200, &json!({ "version": VERSION })))
        .mount(&server)
        .await;

    let config = SessionConfig {
        host: host(&server),
        https: false,
        credentials: Credentials::Token("from-config".to_owned().into()),
        transport: TransportConfig::default(),
        scope: Scope::Default,
    };
    let client = fortios_api::FortiClient::new();
    client.connect(&config).await.unwrap();

    assert_eq!(client.auth_strategy(), Some(AuthStrategy::Token));
    assert_eq!(
        client.base_url().unwrap().as_str(),
        format!("http://{}/", host(&server))
    );
}

// ── Logout tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_logout_resets_session() {
    let server = MockServer::start().await;
    let client = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.logout().await.unwrap();

    assert!(!client.is_logged_in());
    assert_eq!(client.csrf_token(), None);
    assert_eq!(client.auth_strategy(), None);
    assert_eq!(client.license_state(), LicenseState::Valid);
    assert!(matches!(client.version(), Err(Error::NotLoggedIn)));
    assert!(matches!(
        client.get(&Endpoint::cmdb("system", "global")).await,
        Err(Error::NotLoggedIn)
    ));
}

#[tokio::test]
async fn test_operations_before_login_fail() {
    let client = client();

    assert!(matches!(
        client.get(&Endpoint::cmdb("firewall", "address")).await,
        Err(Error::NotLoggedIn)
    ));
    assert!(matches!(
        client.monitor(&Endpoint::monitor("system", "status")).await,
        Err(Error::NotLoggedIn)
    ));
    assert!(matches!(
        client.schema(&Endpoint::cmdb("firewall", "address")).await,
        Err(Error::NotLoggedIn)
    ));
    assert!(matches!(client.require_authenticated(), Err(Error::NotLoggedIn)));
    // Logging out a session that never started is a no-op.
    client.logout().await.unwrap();
}

// ── License tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_license_blocks_operations() {
    let server = MockServer::start().await;
    common::mount_logincheck(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/monitor/license/status"))
        .respond_with(reply(
            200,
            &json!({ "version": VERSION, "results": { "vm": { "status": "invalid" } } }),
        ))
        .mount(&server)
        .await;

    let client = client();
    client
        .login(
            &host(&server),
            "admin",
            &"s3cret".to_owned().into(),
            &TransportConfig::default(),
            &Scope::Default,
        )
        .await
        .unwrap();

    assert!(client.is_logged_in());
    assert_eq!(client.license_state(), LicenseState::Invalid);
    assert!(matches!(client.require_authenticated(), Err(Error::InvalidLicense)));
    assert!(matches!(
        client.get(&Endpoint::cmdb("system", "global")).await,
        Err(Error::InvalidLicense)
    ));
}

#[tokio::test]
async fn test_check_license_recovers_after_fortiguard_update() {
    let server = MockServer::start().await;
    common::mount_logincheck(&server).await;

    // Login probe, then a failing check, then the post-update check.
    Mock::given(method("GET"))
        .and(path("/api/v2/monitor/license/status"))
        .respond_with(reply(200, &json!({ "version": VERSION })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/monitor/license/status"))
        .respond_with(reply(500, &json!({})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/monitor/license/status"))
        .respond_with(reply(
            200,
            &json!({ "results": { "vm": { "status": "valid" } } }),
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/monitor/system/fortiguard/update"))
        .respond_with(reply(200, &json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client();
    client
        .login(
            &host(&server),
            "admin",
            &"s3cret".to_owned().into(),
            &TransportConfig::default(),
            &Scope::Default,
        )
        .await
        .unwrap();

    let resp = client.check_license(&Scope::Default).await.unwrap();
    assert!(resp.is_success());
    assert_eq!(client.license_state(), LicenseState::Valid);
}

#[tokio::test]
async fn test_check_license_marks_invalid_when_update_refused() {
    let server = MockServer::start().await;
    common::mount_logincheck(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/monitor/license/status"))
        .respond_with(reply(200, &json!({ "version": VERSION })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/monitor/license/status"))
        .respond_with(reply(500, &json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/monitor/system/fortiguard/update"))
        .respond_with(reply(403, &json!({})))
        .mount(&server)
        .await;

    let client = client();
    client
        .login(
            &host(&server),
            "admin",
            &"s3cret".to_owned().into(),
            &TransportConfig::default(),
            &Scope::Default,
        )
        .await
        .unwrap();

    let resp = client.check_license(&Scope::Default).await.unwrap();
    assert_eq!(resp.http_status(), 500);
    assert_eq!(client.license_state(), LicenseState::Invalid);
    assert!(matches!(client.require_authenticated(), Err(Error::InvalidLicense)));

    // Logout clears the verdict.
    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    client.logout().await.unwrap();
    assert_eq!(client.license_state(), LicenseState::Valid);
}
