// Hierarchical configuration overlay
//
// A `ConfigTree` maps `<path>` -> `<name>` -> fields. A field whose value
// is a JSON object is a table keyed by mkey (one row per key); any other
// value is a direct setting of the `<path>/<name>` object. Settings are
// applied first across the whole tree so that parent options (operating
// modes, feature switches) are in place before table rows are validated
// against them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{FortiClient, Payload};
use crate::endpoint::{Endpoint, Scope};
use crate::error::Error;
use crate::response::Response;

type Fields = IndexMap<String, Value>;

/// Nested configuration to push to an appliance, in caller order.
///
/// ```yaml
/// system:
///   global:
///     hostname: fw1
/// firewall:
///   address:
///     addr1:
///       subnet: 10.0.0.0/24
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree(IndexMap<String, IndexMap<String, Fields>>);

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn from_json_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Set one field of `path/name`, creating the intermediate levels.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        name: impl Into<String>,
        field: impl Into<String>,
        value: Value,
    ) -> &mut Self {
        self.0
            .entry(path.into())
            .or_default()
            .entry(name.into())
            .or_default()
            .insert(field.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into direct settings and table rows in one pass.
    ///
    /// Classification looks only at the field's own value: a row whose
    /// fields are all scalars is still a table row.
    pub fn partition(&self) -> Partition {
        let mut partition = Partition::default();

        for (path, names) in &self.0 {
            for (name, fields) in names {
                for (field, value) in fields {
                    if let Value::Object(row) = value {
                        partition
                            .tables
                            .entry(path.clone())
                            .or_default()
                            .entry(name.clone())
                            .or_default()
                            .insert(field.clone(), row.clone());
                    } else {
                        partition
                            .settings
                            .entry(path.clone())
                            .or_default()
                            .entry(name.clone())
                            .or_default()
                            .insert(field.clone(), value.clone());
                    }
                }
            }
        }
        partition
    }
}

/// The two disjoint halves of a [`ConfigTree`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// `path -> name -> payload` of direct (scalar / list) settings.
    pub settings: IndexMap<String, IndexMap<String, Payload>>,
    /// `path -> name -> mkey -> row payload`.
    pub tables: IndexMap<String, IndexMap<String, IndexMap<String, Payload>>>,
}

// ── Report ──────────────────────────────────────────────────────────

/// Which pass of the overlay produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPass {
    Settings,
    Table,
}

/// Result of one `set` issued by the overlay.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub pass: ApplyPass,
    pub path: String,
    pub name: String,
    /// Forced mkey for table rows; `None` for settings.
    pub mkey: Option<String>,
    pub response: Response,
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        self.response.is_success()
    }
}

/// An entry not sent because an earlier sibling failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub pass: ApplyPass,
    pub path: String,
    pub name: String,
    pub mkey: Option<String>,
}

/// Per-entry results of [`FortiClient::apply_overlay`].
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub outcomes: Vec<ApplyOutcome>,
    pub skipped: Vec<SkippedEntry>,
}

impl ApplyReport {
    /// Every issued call succeeded and nothing was skipped.
    pub fn succeeded(&self) -> bool {
        self.skipped.is_empty() && self.outcomes.iter().all(ApplyOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ApplyOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

// ── Applier ─────────────────────────────────────────────────────────

impl FortiClient {
    /// Push a whole [`ConfigTree`] through [`set`](Self::set).
    ///
    /// Pass 1 sets every `path/name` object that has direct settings, with
    /// the mkey resolved from the payload. Pass 2 sets every table row with
    /// its key forced as mkey. A failed settings entry skips the remaining
    /// objects under the same `path`; a failed row skips the remaining rows
    /// of the same table. Transport and session errors abort immediately.
    pub async fn apply_overlay(
        &self,
        tree: &ConfigTree,
        scope: &Scope,
    ) -> Result<ApplyReport, Error> {
        let partition = tree.partition();
        let mut report = ApplyReport::default();

        for (path, names) in &partition.settings {
            let mut failed = false;
            for (name, payload) in names {
                if failed {
                    report.skip(ApplyPass::Settings, path, name, None);
                    continue;
                }
                debug!(%path, %name, "applying settings");
                let endpoint = Endpoint::cmdb(path, name).in_scope(scope.clone());
                let response = self.set(&endpoint, payload).await?;
                failed = !response.is_success();
                report.record(ApplyPass::Settings, path, name, None, response);
            }
        }

        for (path, names) in &partition.tables {
            for (name, rows) in names {
                let mut failed = false;
                for (mkey, row) in rows {
                    if failed {
                        report.skip(ApplyPass::Table, path, name, Some(mkey));
                        continue;
                    }
                    debug!(%path, %name, %mkey, "applying table row");
                    let endpoint = Endpoint::cmdb(path, name)
                        .with_mkey(mkey.clone())
                        .in_scope(scope.clone());
                    let response = self.set(&endpoint, row).await?;
                    failed = !response.is_success();
                    report.record(ApplyPass::Table, path, name, Some(mkey), response);
                }
            }
        }

        if !report.succeeded() {
            warn!(
                failures = report.failures().count(),
                skipped = report.skipped.len(),
                "overlay applied with failures"
            );
        }
        Ok(report)
    }
}

impl ApplyReport {
    fn record(
        &mut self,
        pass: ApplyPass,
        path: &str,
        name: &str,
        mkey: Option<&String>,
        response: Response,
    ) {
        self.outcomes.push(ApplyOutcome {
            pass,
            path: path.to_owned(),
            name: name.to_owned(),
            mkey: mkey.cloned(),
            response,
        });
    }

    fn skip(&mut self, pass: ApplyPass, path: &str, name: &str, mkey: Option<&String>) {
        self.skipped.push(SkippedEntry {
            pass,
            path: path.to_owned(),
            name: name.to_owned(),
            mkey: mkey.cloned(),
        });
    }
}
