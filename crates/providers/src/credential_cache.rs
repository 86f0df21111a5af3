//! On-disk cache for resolved API keys.
//!
//! `resolve_api_key` reads secrets from plaintext config or environment
//! variables on every call; this cache lets a role survive a restart where
//! the env var that produced the key is no longer set (e.g. a shell that
//! sourced it once, or a key pasted into `grov config login`). Cached
//! entries are a fallback, never a primary source: a configured `key` or
//! `env` value always wins.
//!
//! Stored at `<config_dir>/grov/credentials.json` with `0o600` permissions
//! on Unix.

use std::collections::HashMap;
use std::path::PathBuf;

use grov_domain::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CredentialStore {
    #[serde(default)]
    roles: HashMap<String, String>,
}

/// Persistent file-based cache for resolved API keys.
pub struct CredentialCache;

impl CredentialCache {
    fn cache_path() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("GROV_CREDENTIAL_CACHE_DIR") {
            return Ok(PathBuf::from(dir).join("credentials.json"));
        }
        let base = dirs::config_dir().ok_or_else(|| {
            Error::Config("unable to determine config directory for credential cache".into())
        })?;
        Ok(base.join("grov").join("credentials.json"))
    }

    fn load_store() -> Result<CredentialStore> {
        let path = Self::cache_path()?;
        if !path.exists() {
            return Ok(CredentialStore::default());
        }
        let file = std::fs::File::open(&path)?;
        fs2::FileExt::lock_shared(&file)
            .map_err(|e| Error::Config(format!("credential cache lock failed: {e}")))?;
        let raw = std::io::read_to_string(&file)?;
        fs2::FileExt::unlock(&file)
            .map_err(|e| Error::Config(format!("credential cache unlock failed: {e}")))?;
        serde_json::from_str(&raw).map_err(|e| Error::Config(format!("corrupt credential cache: {e}")))
    }

    /// Write the full store to disk, creating the parent directory if needed.
    ///
    /// On Unix the file is opened with mode `0o600` from the start to avoid
    /// a TOCTOU window where the cache could briefly be world-readable.
    fn write_store(store: &CredentialStore) -> Result<()> {
        let path = Self::cache_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(store)?;

        #[cfg(unix)]
        let file = {
            use std::os::unix::fs::OpenOptionsExt;
            std::fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(&path)?
        };
        #[cfg(not(unix))]
        let file = std::fs::OpenOptions::new().write(true).create(true).truncate(true).open(&path)?;

        fs2::FileExt::lock_exclusive(&file).map_err(|e| Error::Config(format!("credential cache lock failed: {e}")))?;
        use std::io::Write;
        let mut writer = std::io::BufWriter::new(file);
        writer.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Look up a cached key for `role` (the `AuthConfig`'s owning field name,
    /// e.g. `"upstream"` or an aux-LLM role id).
    pub fn load(role: &str) -> Result<Option<String>> {
        Ok(Self::load_store()?.roles.get(role).cloned())
    }

    /// Cache a key resolved from config or environment for `role`.
    pub fn save(role: &str, key: &str) -> Result<()> {
        let mut store = Self::load_store()?;
        store.roles.insert(role.to_owned(), key.to_owned());
        Self::write_store(&store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_roundtrips_through_json() {
        let mut store = CredentialStore::default();
        store.roles.insert("upstream".into(), "sk-test".into());
        let json = serde_json::to_string(&store).unwrap();
        let loaded: CredentialStore = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.roles.get("upstream").unwrap(), "sk-test");
    }

    #[test]
    fn missing_role_is_none() {
        let store = CredentialStore::default();
        assert!(store.roles.get("nonexistent").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn written_cache_file_is_mode_0600() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        let mut store = CredentialStore::default();
        store.roles.insert("upstream".into(), "sk-test".into());
        let json = serde_json::to_string_pretty(&store).unwrap();

        use std::os::unix::fs::OpenOptionsExt;
        let file = std::fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(&path).unwrap();
        use std::io::Write;
        std::io::BufWriter::new(file).write_all(json.as_bytes()).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
