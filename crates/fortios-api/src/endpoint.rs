// Endpoint addressing for the two FortiOS API surfaces.
//
// Every operation targets an `Endpoint`: surface (cmdb / monitor), the
// `<path>/<name>` pair, an optional mkey suffix, a scope and extra query
// parameters. Building the final URL is pure; the session precondition is
// enforced by `FortiClient::url_for`.

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Characters left unescaped in an mkey path segment: RFC 3986 unreserved only.
const MKEY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// API root shared by both surfaces.
const API_ROOT: &str = "/api/v2";

// ── Surface ─────────────────────────────────────────────────────────

/// Which half of the API an endpoint lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Configuration objects (`/api/v2/cmdb/...`).
    Cmdb,
    /// Runtime state and operational actions (`/api/v2/monitor/...`).
    Monitor,
}

impl Surface {
    pub fn root(self) -> &'static str {
        match self {
            Self::Cmdb => "cmdb",
            Self::Monitor => "monitor",
        }
    }
}

// ── Scope ───────────────────────────────────────────────────────────

/// Configuration partition (VDOM) a request applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Scope {
    /// No scope parameter; the appliance applies the admin's default VDOM.
    #[default]
    Default,
    /// A named VDOM (`?vdom=<name>`).
    Vdom(String),
    /// The global partition (`?global=1`). Responses arrive as one entry per VDOM.
    Global,
}

impl Scope {
    pub fn vdom(name: impl Into<String>) -> Self {
        Self::from(Some(name.into()))
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// The scope tag carried by normalized responses, if any.
    pub fn as_tag(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::Vdom(name) => Some(name),
            Self::Global => Some("global"),
        }
    }

    fn append_to(&self, query: &mut url::form_urlencoded::Serializer<'_, url::UrlQuery<'_>>) {
        match self {
            Self::Default => {}
            Self::Vdom(name) => {
                query.append_pair("vdom", name);
            }
            Self::Global => {
                query.append_pair("global", "1");
            }
        }
    }
}

impl From<Option<String>> for Scope {
    fn from(value: Option<String>) -> Self {
        match value {
            None => Self::Default,
            Some(name) if name.is_empty() => Self::Default,
            Some(name) if name == "global" => Self::Global,
            Some(name) => Self::Vdom(name),
        }
    }
}

impl From<Scope> for Option<String> {
    fn from(scope: Scope) -> Self {
        scope.as_tag().map(str::to_owned)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag().unwrap_or("default"))
    }
}

// ── Move position ───────────────────────────────────────────────────

/// Where a moved table entry lands relative to the reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePosition {
    Before,
    After,
}

impl MovePosition {
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

// ── Endpoint ────────────────────────────────────────────────────────

/// One addressable API object: `/api/v2/<surface>/<path>/<name>[/<mkey>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    surface: Surface,
    path: String,
    name: String,
    mkey: Option<String>,
    scope: Scope,
    params: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(surface: Surface, path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            surface,
            path: path.into(),
            name: name.into(),
            mkey: None,
            scope: Scope::Default,
            params: Vec::new(),
        }
    }

    /// A configuration object: `/api/v2/cmdb/<path>/<name>`.
    pub fn cmdb(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Surface::Cmdb, path, name)
    }

    /// A monitoring object: `/api/v2/monitor/<path>/<name>`.
    pub fn monitor(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Surface::Monitor, path, name)
    }

    /// The bare surface root (`/api/v2/cmdb/`), used for the schema catalog.
    pub(crate) fn catalog(surface: Surface) -> Self {
        Self::new(surface, "", "")
    }

    pub fn with_mkey(mut self, mkey: impl Into<String>) -> Self {
        self.mkey = Some(mkey.into());
        self
    }

    pub(crate) fn with_mkey_opt(mut self, mkey: Option<String>) -> Self {
        self.mkey = mkey;
        self
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Append an extra query parameter (`select`, `filter`, `datasource`...).
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mkey(&self) -> Option<&str> {
        self.mkey.as_deref()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Same object, addressed as the collection (no mkey suffix).
    pub(crate) fn collection(&self) -> Self {
        Self {
            mkey: None,
            ..self.clone()
        }
    }

    /// The schema query for this object's table (`?action=schema`).
    pub(crate) fn schema(&self) -> Self {
        Self {
            mkey: None,
            params: Vec::new(),
            ..self.clone()
        }
        .with_param("action", "schema")
    }

    /// Build the absolute URL against the appliance `base`.
    ///
    /// `<base>/api/v2/<surface>/<path>/<name>[/<escaped mkey>][?global=1|?vdom=..][&params]`
    pub(crate) fn url(&self, base: &Url) -> Result<Url, Error> {
        let mut raw = format!(
            "{}{API_ROOT}/{}/",
            base.as_str().trim_end_matches('/'),
            self.surface.root()
        );
        if !self.path.is_empty() {
            raw.push_str(&self.path);
            raw.push('/');
            raw.push_str(&self.name);
        }
        if let Some(ref mkey) = self.mkey {
            raw.push('/');
            raw.push_str(&escape_mkey(mkey));
        }

        let mut url = Url::parse(&raw)?;
        {
            let mut query = url.query_pairs_mut();
            self.scope.append_to(&mut query);
            for (key, value) in &self.params {
                query.append_pair(key, value);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.surface.root(), self.path, self.name)?;
        if let Some(ref mkey) = self.mkey {
            write!(f, "/{mkey}")?;
        }
        Ok(())
    }
}

/// Percent-escape an mkey value; only unreserved characters survive.
pub fn escape_mkey(mkey: &str) -> String {
    utf8_percent_encode(mkey, MKEY_ESCAPE).to_string()
}
