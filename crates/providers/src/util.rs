//! Shared utility functions for provider adapters.

use crate::credential_cache::CredentialCache;
use grov_domain::config::AuthConfig;
use grov_domain::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key from an [`AuthConfig`] for the given role (e.g.
/// `"upstream"` or an aux-LLM role id — the [`CredentialCache`] key).
///
/// Precedence: plaintext `key` field (warn), then `env` var, then the
/// on-disk credential cache (a key resolved by an earlier run and cached
/// for a restart where the env var is no longer set). No keychain
/// integration — aux-LLM roles are server-side config, not a desktop
/// credential flow. A key resolved from `env` is cached for that fallback;
/// a plaintext `key` is never cached since it is already durable in config.
pub fn resolve_api_key(role: &str, auth: &AuthConfig) -> Result<String> {
    if let Some(ref key) = auth.key {
        tracing::warn!(
            "API key loaded from plaintext config field 'key' — prefer 'env' instead"
        );
        return Ok(key.clone());
    }

    if let Some(ref env_var) = auth.env {
        match std::env::var(env_var) {
            Ok(key) => {
                if let Err(e) = CredentialCache::save(role, &key) {
                    tracing::warn!(error = %e, role, "failed to cache resolved API key");
                }
                return Ok(key);
            }
            Err(_) => {
                if let Ok(Some(cached)) = CredentialCache::load(role) {
                    tracing::info!(role, env = %env_var, "env var unset, using cached API key");
                    return Ok(cached);
                }
                return Err(Error::Config(format!(
                    "environment variable '{}' not set or not valid UTF-8",
                    env_var
                )));
            }
        }
    }

    Err(Error::Config(
        "no API key configured: set 'key' or 'env' in AuthConfig".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Redirects the credential cache to a throwaway directory so these
    /// tests never touch the real `~/.config/grov` on the machine running
    /// them. Kept alive for the duration of the test via the returned guard.
    fn isolated_cache_dir() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("GROV_CREDENTIAL_CACHE_DIR", tmp.path());
        tmp
    }

    #[test]
    fn resolve_api_key_plaintext() {
        let _tmp = isolated_cache_dir();
        let auth = AuthConfig {
            key: Some("sk-test-123".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key("test-plaintext", &auth).unwrap(), "sk-test-123");
    }

    #[test]
    fn resolve_api_key_env_var() {
        let _tmp = isolated_cache_dir();
        let var_name = "GROV_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let auth = AuthConfig {
            env: Some(var_name.into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key("test-env", &auth).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_env_var_missing_falls_back_to_error_without_cache() {
        let _tmp = isolated_cache_dir();
        let auth = AuthConfig {
            env: Some("GROV_TEST_NONEXISTENT_VAR_8888".into()),
            ..Default::default()
        };
        let err = resolve_api_key("test-missing", &auth).unwrap_err();
        assert!(err.to_string().contains("GROV_TEST_NONEXISTENT_VAR_8888"));
    }

    #[test]
    fn resolve_api_key_no_config() {
        let _tmp = isolated_cache_dir();
        let auth = AuthConfig::default();
        let err = resolve_api_key("test-empty", &auth).unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }

    #[test]
    fn resolve_api_key_plaintext_takes_precedence_over_env() {
        let _tmp = isolated_cache_dir();
        let auth = AuthConfig {
            key: Some("plaintext-wins".into()),
            env: Some("GROV_TEST_SHOULD_NOT_BE_READ".into()),
        };
        assert_eq!(resolve_api_key("test-precedence", &auth).unwrap(), "plaintext-wins");
    }

    #[test]
    fn resolve_api_key_falls_back_to_cached_key_when_env_unset() {
        let _tmp = isolated_cache_dir();
        let var_name = "GROV_TEST_CACHE_FALLBACK_VAR";
        std::env::set_var(var_name, "first-resolved-key");
        let auth = AuthConfig {
            env: Some(var_name.into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key("test-fallback", &auth).unwrap(), "first-resolved-key");
        std::env::remove_var(var_name);

        // Env var is gone now; the key resolved above should have been cached.
        assert_eq!(resolve_api_key("test-fallback", &auth).unwrap(), "first-resolved-key");
    }
}
