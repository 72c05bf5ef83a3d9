//! Token allow-list policy
//!
//! An empty allow-list admits every request (fail-open). This is the interim
//! policy while no tokens are provisioned and is not a security boundary.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Environment variable holding the comma-separated allow-list
pub const DEFAULT_TOKEN_ENV: &str = "DIGEST_TOKEN";

/// Ordered set of accepted tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList {
    tokens: Vec<String>,
}

impl AllowList {
    /// Create an empty (fail-open) allow-list
    pub fn new() -> Self {
        AllowList { tokens: Vec::new() }
    }

    /// Parse a comma-separated list into trimmed, non-empty, unique entries
    pub fn parse(raw: &str) -> Self {
        let mut list = AllowList::new();
        list.extend(raw.split(','));
        list
    }

    /// Build from already-split entries; entries are trimmed and deduplicated
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = AllowList::new();
        list.extend(tokens);
        list
    }

    /// Add entries, preserving first-seen order
    pub fn extend<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            let token = token.as_ref().trim();
            if !token.is_empty() && !self.tokens.iter().any(|t| t == token) {
                self.tokens.push(token.to_string());
            }
        }
    }

    /// Whether no token is configured
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of configured tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// First configured token, used as the service credential
    pub fn primary(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// Configured tokens in order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Exact membership test, constant time per entry
    pub fn contains(&self, token: &str) -> bool {
        self.tokens
            .iter()
            .fold(false, |found, t| found | bool::from(t.as_bytes().ct_eq(token.as_bytes())))
    }

    /// Decide whether a token is acceptable.
    ///
    /// Always `true` when the list is empty, including for a missing token.
    pub fn is_authorized(&self, token: Option<&str>) -> bool {
        if self.is_empty() {
            return true;
        }
        token.is_some_and(|t| self.contains(t))
    }
}

/// Where the effective allow-list comes from.
///
/// Static tokens are unioned with the current value of an environment
/// variable. The variable is read on every call to [`AllowListSource::current`],
/// so changes apply to the next request without a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowListSource {
    static_tokens: AllowList,
    env_var: Option<String>,
}

impl AllowListSource {
    /// Create a source from static tokens and an optional environment variable
    pub fn new(static_tokens: AllowList, env_var: Option<String>) -> Self {
        AllowListSource {
            static_tokens,
            env_var,
        }
    }

    /// Source that only reads the given environment variable
    pub fn from_env(var: impl Into<String>) -> Self {
        Self::new(AllowList::new(), Some(var.into()))
    }

    /// Source with a fixed list and no environment lookup
    pub fn fixed(tokens: AllowList) -> Self {
        Self::new(tokens, None)
    }

    /// Environment variable consulted, if any
    pub fn env_var(&self) -> Option<&str> {
        self.env_var.as_deref()
    }

    /// Read the allow-list as of now. An unset variable contributes nothing.
    pub fn current(&self) -> AllowList {
        let mut list = self.static_tokens.clone();
        if let Some(var) = &self.env_var {
            if let Ok(raw) = std::env::var(var) {
                list.extend(raw.split(','));
            }
        }
        list
    }
}

/// Check a token against the `DIGEST_TOKEN` allow-list as currently set
pub fn is_token_authorized(token: Option<&str>) -> bool {
    AllowListSource::from_env(DEFAULT_TOKEN_ENV)
        .current()
        .is_authorized(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_drops_empty_entries() {
        let list = AllowList::parse(" a , ,b,, a ");
        assert_eq!(list.tokens(), &["a".to_string(), "b".to_string()]);
        assert_eq!(list.primary(), Some("a"));
    }

    #[test]
    fn test_empty_list_fails_open() {
        let list = AllowList::parse("");
        assert!(list.is_empty());
        assert!(list.is_authorized(Some("anything")));
        assert!(list.is_authorized(None));

        let blank = AllowList::parse(" , ,");
        assert!(blank.is_authorized(None));
    }

    #[test]
    fn test_membership() {
        let list = AllowList::parse("a,b");
        assert!(list.is_authorized(Some("a")));
        assert!(list.is_authorized(Some("b")));
        assert!(!list.is_authorized(Some("c")));
        assert!(!list.is_authorized(None));
        assert!(!list.is_authorized(Some("")));
        assert!(!list.is_authorized(Some("ab")));
    }

    #[test]
    fn test_order_irrelevant() {
        let forward = AllowList::parse("a,b");
        let reverse = AllowList::parse("b,a");
        for token in ["a", "b", "c"] {
            assert_eq!(
                forward.is_authorized(Some(token)),
                reverse.is_authorized(Some(token))
            );
        }
    }

    #[test]
    fn test_source_reads_env_each_time() {
        let var = "DIGEST_TEST_POLICY_SOURCE_RELOAD";
        std::env::remove_var(var);
        let source = AllowListSource::from_env(var);
        assert!(source.current().is_empty());

        std::env::set_var(var, "t1,t2");
        assert_eq!(source.current().len(), 2);

        std::env::set_var(var, "t3");
        let list = source.current();
        assert!(list.is_authorized(Some("t3")));
        assert!(!list.is_authorized(Some("t1")));

        std::env::remove_var(var);
        assert!(source.current().is_empty());
    }

    #[test]
    fn test_source_unions_static_and_env() {
        let var = "DIGEST_TEST_POLICY_SOURCE_UNION";
        std::env::set_var(var, "env-token, static-token");
        let source = AllowListSource::new(AllowList::parse("static-token"), Some(var.into()));

        let list = source.current();
        assert_eq!(
            list.tokens(),
            &["static-token".to_string(), "env-token".to_string()]
        );
        std::env::remove_var(var);
    }

    #[test]
    fn test_fixed_source_ignores_env() {
        let source = AllowListSource::fixed(AllowList::parse("x"));
        assert!(source.env_var().is_none());
        assert_eq!(source.current(), AllowList::parse("x"));
    }
}
