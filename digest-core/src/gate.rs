//! Edge gate: per-request allow/deny decision
//!
//! The gate holds an atomically swappable snapshot of its configuration so a
//! reload never blocks or tears an in-flight decision. The allow-list itself
//! is read fresh from its source on every evaluation.

use crate::config::GateConfig;
use crate::credential::{CredentialExtractor, Credentials};
use crate::error::Result;
use crate::policy::AllowListSource;
use crate::request::GateRequest;
use crate::route::{RouteClass, RouteTable};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Why a request was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllowReason {
    /// Path is never gated
    PublicRoute,
    /// No allow-list configured
    FailOpen,
    /// Token found in the allow-list
    Token,
    /// A session cookie was present
    SessionCookie,
}

impl AllowReason {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            AllowReason::PublicRoute => "public-route",
            AllowReason::FailOpen => "fail-open",
            AllowReason::Token => "token",
            AllowReason::SessionCookie => "session-cookie",
        }
    }
}

/// How a request is refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Denial {
    /// Respond 401 with a JSON body
    Unauthorized,
    /// Redirect to the login page
    Redirect {
        /// Target including the return query parameter
        location: String,
    },
}

/// Outcome of gate evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum GateDecision {
    /// Pass the request through unmodified
    Allow {
        /// Why it was allowed
        reason: AllowReason,
    },
    /// Short-circuit with a deny response
    Deny {
        /// Response shape
        denial: Denial,
    },
}

impl GateDecision {
    /// Whether the request may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow { .. })
    }

    /// Stable label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            GateDecision::Allow { reason } => reason.as_str(),
            GateDecision::Deny {
                denial: Denial::Unauthorized,
            } => "unauthorized",
            GateDecision::Deny {
                denial: Denial::Redirect { .. },
            } => "redirect",
        }
    }
}

/// Everything the gate needs for one decision, swapped as a unit on reload
#[derive(Debug)]
struct GateSnapshot {
    routes: RouteTable,
    extractor: CredentialExtractor,
    allow_list: AllowListSource,
    login_path: String,
    return_param: String,
}

impl GateSnapshot {
    fn from_config(config: &GateConfig) -> Self {
        GateSnapshot {
            routes: RouteTable::from_config(config),
            extractor: CredentialExtractor::new(
                config.cookie_name.clone(),
                config.session_cookies.clone(),
            ),
            allow_list: config.allow_list_source(),
            login_path: config.login_path.clone(),
            return_param: config.return_param.clone(),
        }
    }

    fn login_location(&self, path: &str) -> String {
        format!(
            "{}?{}={}",
            self.login_path,
            self.return_param,
            urlencoding::encode(path)
        )
    }
}

/// The edge gate
#[derive(Debug)]
pub struct Gate {
    snapshot: ArcSwap<GateSnapshot>,
}

impl Gate {
    /// Create a gate from validated configuration
    pub fn new(config: &GateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Gate {
            snapshot: ArcSwap::from_pointee(GateSnapshot::from_config(config)),
        })
    }

    /// Replace the configuration atomically. An invalid configuration is
    /// rejected and the current one kept.
    pub fn reload(&self, config: &GateConfig) -> Result<()> {
        config.validate()?;
        self.snapshot
            .store(Arc::new(GateSnapshot::from_config(config)));
        debug!("Gate configuration replaced");
        Ok(())
    }

    /// Classify a path under the current configuration
    pub fn classify(&self, path: &str) -> RouteClass {
        self.snapshot.load().routes.classify(path)
    }

    /// Extract credentials under the current configuration
    pub fn credentials(&self, request: &GateRequest) -> Credentials {
        self.snapshot.load().extractor.extract(request)
    }

    /// Primary allow-list token as of now, used as the service credential
    pub fn service_token(&self) -> Option<String> {
        self.snapshot
            .load()
            .allow_list
            .current()
            .primary()
            .map(str::to_string)
    }

    /// Whether the allow-list is currently empty
    pub fn is_fail_open(&self) -> bool {
        self.snapshot.load().allow_list.current().is_empty()
    }

    /// Decide whether a request may proceed
    #[instrument(skip(self, request), fields(request_id = %request.request_id, path = %request.path))]
    pub fn evaluate(&self, request: &GateRequest) -> GateDecision {
        let snapshot = self.snapshot.load();

        let class = snapshot.routes.classify(&request.path);
        if !class.is_protected() {
            trace!("Public route");
            return GateDecision::Allow {
                reason: AllowReason::PublicRoute,
            };
        }

        let allow_list = snapshot.allow_list.current();
        if allow_list.is_empty() {
            trace!("No allow-list configured, failing open");
            return GateDecision::Allow {
                reason: AllowReason::FailOpen,
            };
        }

        let credentials = snapshot.extractor.extract(request);
        if credentials.token.is_some() && allow_list.is_authorized(credentials.token.as_deref()) {
            return GateDecision::Allow {
                reason: AllowReason::Token,
            };
        }
        if credentials.has_session() {
            return GateDecision::Allow {
                reason: AllowReason::SessionCookie,
            };
        }

        debug!(route = class.as_str(), "Request has no acceptable credential");
        let denial = match class {
            RouteClass::ProtectedApi => Denial::Unauthorized,
            _ => Denial::Redirect {
                location: snapshot.login_location(&request.path),
            },
        };
        GateDecision::Deny { denial }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::GateRequestBuilder;

    fn gate_with_tokens(tokens: &[&str]) -> Gate {
        let config = GateConfig {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            token_env: None,
            ..GateConfig::default()
        };
        Gate::new(&config).unwrap()
    }

    fn gate_with_session(tokens: &[&str], session_cookie: &str) -> Gate {
        let config = GateConfig {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            token_env: None,
            session_cookies: vec![session_cookie.to_string()],
            ..GateConfig::default()
        };
        Gate::new(&config).unwrap()
    }

    #[test]
    fn test_api_path_without_credential_is_unauthorized() {
        let gate = gate_with_tokens(&["secret"]);
        let decision = gate.evaluate(&GateRequest::new("/api/report/xyz"));
        assert_eq!(
            decision,
            GateDecision::Deny {
                denial: Denial::Unauthorized
            }
        );
    }

    #[test]
    fn test_page_path_without_credential_redirects() {
        let gate = gate_with_tokens(&["secret"]);
        let decision = gate.evaluate(&GateRequest::new("/dashboard"));
        assert_eq!(
            decision,
            GateDecision::Deny {
                denial: Denial::Redirect {
                    location: "/onboarding?from=%2Fdashboard".to_string()
                }
            }
        );
    }

    #[test]
    fn test_redirect_encodes_nested_path() {
        let gate = gate_with_tokens(&["secret"]);
        let decision = gate.evaluate(&GateRequest::new("/report/a b"));
        assert_eq!(decision.label(), "redirect");
        match decision {
            GateDecision::Deny {
                denial: Denial::Redirect { location },
            } => assert_eq!(location, "/onboarding?from=%2Freport%2Fa%20b"),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_health_always_passes() {
        let gate = gate_with_tokens(&["secret"]);
        let decision = gate.evaluate(&GateRequest::new("/health"));
        assert_eq!(
            decision,
            GateDecision::Allow {
                reason: AllowReason::PublicRoute
            }
        );
    }

    #[test]
    fn test_login_page_is_never_gated() {
        let gate = gate_with_tokens(&["secret"]);
        assert!(gate.evaluate(&GateRequest::new("/onboarding")).is_allowed());
    }

    #[test]
    fn test_fail_open_without_allow_list() {
        let gate = gate_with_tokens(&[]);
        assert!(gate.is_fail_open());
        let decision = gate.evaluate(&GateRequest::new("/dashboard"));
        assert_eq!(
            decision,
            GateDecision::Allow {
                reason: AllowReason::FailOpen
            }
        );
    }

    #[test]
    fn test_valid_bearer_token_is_allowed() {
        let gate = gate_with_tokens(&["a", "b"]);
        let request = GateRequestBuilder::new("/api/report/1").bearer("b").build();
        assert_eq!(gate.evaluate(&request).label(), "token");
    }

    #[test]
    fn test_valid_cookie_token_is_allowed() {
        let gate = gate_with_tokens(&["a b"]);
        let request = GateRequestBuilder::new("/report/1")
            .cookie("digest-token=a%20b")
            .build();
        assert!(gate.evaluate(&request).is_allowed());
    }

    #[test]
    fn test_wrong_token_is_denied() {
        let gate = gate_with_tokens(&["a"]);
        let request = GateRequestBuilder::new("/account").bearer("c").build();
        assert!(!gate.evaluate(&request).is_allowed());
    }

    #[test]
    fn test_session_cookie_is_secondary_credential() {
        let gate = gate_with_session(&["a"], "digest-session");
        let request = GateRequestBuilder::new("/subscriptions")
            .bearer("wrong")
            .cookie("digest-session=opaque")
            .build();
        assert_eq!(
            gate.evaluate(&request),
            GateDecision::Allow {
                reason: AllowReason::SessionCookie
            }
        );
    }

    #[test]
    fn test_token_reason_preferred_over_session() {
        let gate = gate_with_session(&["a"], "digest-session");
        let request = GateRequestBuilder::new("/dashboard")
            .bearer("a")
            .cookie("digest-session=opaque")
            .build();
        assert_eq!(gate.evaluate(&request).label(), "token");
    }

    #[test]
    fn test_session_cookie_ignored_unless_configured() {
        let gate = gate_with_tokens(&["secret"]);
        let request = GateRequestBuilder::new("/api/report/x")
            .cookie("digest-session=anything")
            .build();
        assert_eq!(
            gate.evaluate(&request),
            GateDecision::Deny {
                denial: Denial::Unauthorized
            }
        );
    }

    #[test]
    fn test_reload_swaps_configuration() {
        let gate = gate_with_tokens(&["a"]);
        let request = GateRequestBuilder::new("/dashboard").bearer("z").build();
        assert!(!gate.evaluate(&request).is_allowed());

        let config = GateConfig {
            tokens: vec!["z".into()],
            token_env: None,
            ..GateConfig::default()
        };
        gate.reload(&config).unwrap();
        assert!(gate.evaluate(&request).is_allowed());
        assert_eq!(gate.service_token().as_deref(), Some("z"));
    }

    #[test]
    fn test_invalid_reload_keeps_previous() {
        let gate = gate_with_tokens(&["a"]);
        let bad = GateConfig {
            login_path: "/nowhere".into(),
            ..GateConfig::default()
        };
        assert!(gate.reload(&bad).is_err());
        assert!(!gate.evaluate(&GateRequest::new("/dashboard")).is_allowed());
    }

    #[test]
    fn test_decision_serialization() {
        let decision = GateDecision::Deny {
            denial: Denial::Redirect {
                location: "/onboarding?from=%2F".into(),
            },
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["denial"]["kind"], "redirect");
    }
}
