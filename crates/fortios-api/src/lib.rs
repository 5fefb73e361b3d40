//! Async Rust client for the FortiOS REST API.
//!
//! One [`FortiClient`] owns one authenticated session with an appliance
//! and exposes both API surfaces:
//!
//! - **cmdb** (configuration): [`get`](FortiClient::get),
//!   [`post`](FortiClient::post), [`put`](FortiClient::put),
//!   [`delete`](FortiClient::delete), [`move_entry`](FortiClient::move_entry)
//!   and the idempotent [`set`](FortiClient::set).
//! - **monitor** (runtime state): [`monitor`](FortiClient::monitor),
//!   [`execute`](FortiClient::execute), [`download`](FortiClient::download),
//!   [`upload`](FortiClient::upload).
//!
//! Identity keys (mkeys) are discovered from the appliance's table schema,
//! so callers can address table entries by payload alone.
//! [`apply_overlay`](FortiClient::apply_overlay) pushes a whole nested
//! [`ConfigTree`], object settings first and table rows second.
//!
//! ```rust,no_run
//! use fortios_api::{Endpoint, FortiClient, Payload, Scope, TransportConfig};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FortiClient::new();
//! let password = "secret".to_owned().into();
//! client
//!     .login("10.0.0.1", "admin", &password, &TransportConfig::default(), &Scope::vdom("root"))
//!     .await?;
//!
//! let payload: Payload =
//!     serde_json::from_value(json!({ "name": "addr1", "subnet": "10.0.0.0/24" }))?;
//! let resp = client
//!     .set(&Endpoint::cmdb("firewall", "address"), &payload)
//!     .await?;
//! assert!(resp.is_success());
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod cmdb;
pub mod endpoint;
pub mod error;
pub mod license;
pub mod login;
pub mod monitor;
pub mod overlay;
pub mod response;
pub mod schema;
pub mod transport;

pub use auth::{AuthStrategy, Credentials, SessionConfig};
pub use client::{CSRF_HEADER, FortiClient, Payload};
pub use cmdb::CREATE_FALLBACK_STATUSES;
pub use endpoint::{Endpoint, MovePosition, Scope, Surface};
pub use error::Error;
pub use license::LicenseState;
pub use monitor::UploadFile;
pub use overlay::{ApplyOutcome, ApplyPass, ApplyReport, ConfigTree, Partition, SkippedEntry};
pub use response::{ApiResponse, RawResponse, Response, Status};
pub use schema::CmdbTable;
pub use transport::{TlsMode, TransportConfig};
