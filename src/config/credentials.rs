// API key resolution
//
// Credentials are resolved once and threaded into the client as an immutable
// `ApiKey`. Nothing else in the crate reads the environment for them.

use crate::mackerel::error::{MackerelError, Result};
use std::fmt;

/// Primary environment variable holding the Mackerel API key
pub const API_KEY_ENV: &str = "MACKEREL_API_KEY";
/// Compatibility alias accepted when the primary variable is unset
pub const API_KEY_ENV_ALIAS: &str = "MACKEREL_APIKEY";

/// Mackerel API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key as given. Empty or whitespace-only values count as absent.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(<redacted, {} chars>)", self.0.len())
    }
}

/// Resolve the API key: explicit value first, then `MACKEREL_API_KEY`, then
/// `MACKEREL_APIKEY`. `lookup` reads an environment variable.
pub fn resolve_api_key<F>(explicit: Option<&str>, lookup: F) -> Result<ApiKey>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = explicit.and_then(ApiKey::new) {
        return Ok(key);
    }

    [API_KEY_ENV, API_KEY_ENV_ALIAS]
        .into_iter()
        .find_map(|var| lookup(var).and_then(ApiKey::new))
        .ok_or_else(|| {
            MackerelError::configuration(format!(
                "Mackerel API key not found: pass it explicitly or set {API_KEY_ENV} (or {API_KEY_ENV_ALIAS})"
            ))
        })
}

/// Resolve the API key against the process environment
pub fn resolve_api_key_from_env(explicit: Option<&str>) -> Result<ApiKey> {
    resolve_api_key(explicit, |var| std::env::var(var).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_explicit_key_wins() {
        let key = resolve_api_key(Some("explicit"), env(&[(API_KEY_ENV, "from-env")])).unwrap();
        assert_eq!(key.expose(), "explicit");
    }

    #[test]
    fn test_primary_env_var() {
        let key = resolve_api_key(None, env(&[(API_KEY_ENV, "from-env")])).unwrap();
        assert_eq!(key.expose(), "from-env");
    }

    #[test]
    fn test_alias_env_var_used_when_primary_missing() {
        let key = resolve_api_key(None, env(&[(API_KEY_ENV_ALIAS, "legacy")])).unwrap();
        assert_eq!(key.expose(), "legacy");
    }

    #[test]
    fn test_primary_preferred_over_alias() {
        let key = resolve_api_key(
            None,
            env(&[(API_KEY_ENV, "primary"), (API_KEY_ENV_ALIAS, "legacy")]),
        )
        .unwrap();
        assert_eq!(key.expose(), "primary");
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let err = resolve_api_key(None, env(&[])).unwrap_err();
        assert!(matches!(err, MackerelError::Configuration { .. }));
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn test_empty_values_count_as_absent() {
        let err = resolve_api_key(Some("  "), env(&[(API_KEY_ENV, "")])).unwrap_err();
        assert!(matches!(err, MackerelError::Configuration { .. }));
    }

    #[test]
    fn test_env_value_is_stored_verbatim() {
        let key = resolve_api_key(None, env(&[(API_KEY_ENV, " padded-key\n")])).unwrap();
        assert_eq!(key.expose(), " padded-key\n");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let key = ApiKey::new("super-secret").unwrap();
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("12 chars"));
    }
}
