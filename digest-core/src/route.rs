//! Path classification for the edge gate

use crate::config::GateConfig;
use serde::{Deserialize, Serialize};

/// How a path is treated by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteClass {
    /// Never gated
    Public,
    /// Gated; denied with a 401 JSON body
    ProtectedApi,
    /// Gated; denied with a redirect to the login page
    ProtectedPage,
}

impl RouteClass {
    /// Whether the gate must check credentials for this class
    pub fn is_protected(&self) -> bool {
        !matches!(self, RouteClass::Public)
    }

    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Public => "public",
            RouteClass::ProtectedApi => "protected-api",
            RouteClass::ProtectedPage => "protected-page",
        }
    }
}

/// Public paths and gated prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    public_paths: Vec<String>,
    protected_prefixes: Vec<String>,
    api_prefix: String,
}

impl RouteTable {
    /// Create a table from explicit lists
    pub fn new(
        public_paths: Vec<String>,
        protected_prefixes: Vec<String>,
        api_prefix: impl Into<String>,
    ) -> Self {
        RouteTable {
            public_paths,
            protected_prefixes,
            api_prefix: api_prefix.into(),
        }
    }

    /// Create a table from gate configuration
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            config.public_paths.clone(),
            config.protected_prefixes.clone(),
            config.api_prefix.clone(),
        )
    }

    /// Classify a request path.
    ///
    /// Public paths are checked first so that the login flow can never be
    /// gated. Paths matching no gated prefix are public as well. The deny
    /// shape depends on the path prefix only.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.public_paths.iter().any(|p| matches_public(p, path)) {
            return RouteClass::Public;
        }
        if !self.protected_prefixes.iter().any(|p| matches_prefix(p, path)) {
            return RouteClass::Public;
        }
        if matches_prefix(&self.api_prefix, path) {
            RouteClass::ProtectedApi
        } else {
            RouteClass::ProtectedPage
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

/// `/` only matches itself; any other public entry also covers its sub-paths
fn matches_public(entry: &str, path: &str) -> bool {
    if entry == "/" {
        path == "/"
    } else {
        matches_prefix(entry, path)
    }
}

/// Prefix match on a segment boundary: `/report` matches `/report` and
/// `/report/1` but not `/reports`
fn matches_prefix(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
