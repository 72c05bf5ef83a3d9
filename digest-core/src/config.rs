//! Gateway configuration
//!
//! Configuration is read once at startup from an optional TOML file plus a
//! few environment overrides, validated, and passed to the gate and proxy
//! constructors. Only the `[gate]` section is hot-reloadable.

use crate::credential::DEFAULT_TOKEN_COOKIE;
use crate::error::{GateError, Result};
use crate::policy::{AllowList, AllowListSource, DEFAULT_TOKEN_ENV};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding the upstream base URL
pub const BACKEND_URL_ENV: &str = "BACKEND_URL";

/// Environment variable overriding the listen address
pub const BIND_ADDRESS_ENV: &str = "BIND_ADDRESS";

/// Upstream used when nothing is configured
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:4000";

/// Listen address used when nothing is configured
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Complete gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DigestConfig {
    /// Edge gate settings
    pub gate: GateConfig,
    /// Upstream backend settings
    pub backend: BackendConfig,
    /// Listener settings
    pub server: ServerConfig,
}

/// Edge gate settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Cookie carrying the access token
    pub cookie_name: String,
    /// Cookies whose presence alone admits a request
    pub session_cookies: Vec<String>,
    /// Paths that are never gated
    pub public_paths: Vec<String>,
    /// Path prefixes subject to the gate
    pub protected_prefixes: Vec<String>,
    /// Gated paths under this prefix are denied with 401 JSON instead of a redirect
    pub api_prefix: String,
    /// Redirect target for denied page requests
    pub login_path: String,
    /// Query parameter carrying the originally requested path
    pub return_param: String,
    /// Static allow-list entries
    pub tokens: Vec<String>,
    /// Environment variable read on every request for extra allow-list entries
    pub token_env: Option<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            cookie_name: DEFAULT_TOKEN_COOKIE.to_string(),
            session_cookies: Vec::new(),
            public_paths: ["/", "/onboarding", "/sample-report", "/health"]
                .map(String::from)
                .to_vec(),
            protected_prefixes: [
                "/dashboard",
                "/report",
                "/newsletter",
                "/api/report",
                "/account",
                "/subscriptions",
            ]
            .map(String::from)
            .to_vec(),
            api_prefix: "/api".to_string(),
            login_path: "/onboarding".to_string(),
            return_param: "from".to_string(),
            tokens: Vec::new(),
            token_env: Some(DEFAULT_TOKEN_ENV.to_string()),
        }
    }
}

impl GateConfig {
    /// Allow-list source described by this configuration
    pub fn allow_list_source(&self) -> AllowListSource {
        AllowListSource::new(
            AllowList::from_tokens(&self.tokens),
            self.token_env.clone(),
        )
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.cookie_name.trim().is_empty() {
            return Err(GateError::ConfigError("cookie_name must not be empty".into()));
        }

        let paths = self
            .public_paths
            .iter()
            .chain(&self.protected_prefixes)
            .chain([&self.api_prefix, &self.login_path]);
        for path in paths {
            if !path.starts_with('/') {
                return Err(GateError::ConfigError(format!(
                    "path '{}' must start with '/'",
                    path
                )));
            }
        }

        if !self.public_paths.iter().any(|p| p == &self.login_path) {
            return Err(GateError::ConfigError(format!(
                "login_path '{}' must be listed in public_paths",
                self.login_path
            )));
        }

        if self.return_param.is_empty() {
            return Err(GateError::ConfigError("return_param must not be empty".into()));
        }

        Ok(())
    }
}

/// Upstream backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the backend API
    pub url: String,
    /// Serve canned development data from the typed client
    pub fixtures: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            url: DEFAULT_BACKEND_URL.to_string(),
            fixtures: false,
        }
    }
}

impl BackendConfig {
    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    fn validate(&self) -> Result<()> {
        let url = self.url.trim();
        let rest = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .ok_or_else(|| {
                GateError::ConfigError(format!("backend url '{}' must be http or https", url))
            })?;
        if rest.is_empty() || rest.starts_with('/') {
            return Err(GateError::ConfigError(format!(
                "backend url '{}' has no host",
                url
            )));
        }
        Ok(())
    }
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

impl DigestConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: DigestConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Load the optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `BACKEND_URL` and `BIND_ADDRESS` when set and non-empty
    pub fn apply_env(&mut self) {
        if let Some(url) = non_empty_env(BACKEND_URL_ENV) {
            self.backend.url = url;
        }
        if let Some(addr) = non_empty_env(BIND_ADDRESS_ENV) {
            self.server.bind_address = addr;
        }
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.gate.validate()?;
        self.backend.validate()?;
        Ok(())
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
