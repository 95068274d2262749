use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::registry::visibility::Visibility;
use crate::registry::RegistryError;

/// Exit status used when a registry write cannot be persisted. A lost
/// visibility preference is a privacy regression, so the process stops here
/// and lets the supervisor restart it.
pub const PERSISTENCE_EXIT_CODE: i32 = 2;

/// Self-service registry entry, keyed by hardware address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    #[serde(rename = "device-name", default)]
    pub device_name: String,
    pub visibility: Visibility,
    /// Last change, epoch milliseconds.
    #[serde(default)]
    pub ts: i64,
}

/// Mutable mac -> identity lookup. One writer at a time, many concurrent
/// readers. A mutation is acknowledged only after it has been persisted.
pub trait UserRegistry: Send + Sync {
    fn get(&self, mac: &str) -> Option<UserEntry>;
    fn set(&self, mac: &str, entry: UserEntry);
    fn delete(&self, mac: &str);
}

/// File-backed user registry. The whole map is rewritten on every mutation,
/// before the call returns.
pub struct PersistentUserRegistry {
    entries: RwLock<HashMap<String, UserEntry>>,
    file: PathBuf,
}

impl PersistentUserRegistry {
    /// Loads the registry file once. An unreadable or unparsable file is a
    /// bootstrap error: the process must not start without it.
    pub fn load(file: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let file = file.into();
        let raw = fs::read(&file)
            .map_err(|source| RegistryError::Io { file: file.clone(), source })?;
        let entries: HashMap<String, UserEntry> = serde_json::from_slice(&raw)
            .map_err(|source| RegistryError::Parse { file: file.clone(), source })?;
        log::info!("Loaded {} user registry entries from {}", entries.len(), file.display());
        Ok(Self { entries: RwLock::new(entries), file })
    }

    fn persist(&self, entries: &HashMap<String, UserEntry>) {
        let bytes = match serde_json::to_vec_pretty(entries) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("Can't serialize the user registry: {}", err);
                std::process::exit(PERSISTENCE_EXIT_CODE);
            }
        };
        if let Err(err) = fs::write(&self.file, bytes) {
            log::error!("Can't save the user registry to {}: {}", self.file.display(), err);
            std::process::exit(PERSISTENCE_EXIT_CODE);
        }
    }
}

impl UserRegistry for PersistentUserRegistry {
    fn get(&self, mac: &str) -> Option<UserEntry> {
        self.entries.read().expect("user registry lock poisoned").get(mac).cloned()
    }

    fn set(&self, mac: &str, entry: UserEntry) {
        let mut entries = self.entries.write().expect("user registry lock poisoned");
        entries.insert(mac.to_string(), entry);
        self.persist(&entries);
    }

    fn delete(&self, mac: &str) {
        let mut entries = self.entries.write().expect("user registry lock poisoned");
        entries.remove(mac);
        self.persist(&entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn registry_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_and_looks_up_entries() {
        let file = registry_file(
            r#"{"00:00:00:00:00:01": {"name": "holger", "device-name": "handy", "visibility": "user", "ts": 1427737817755}}"#,
        );
        let registry = PersistentUserRegistry::load(file.path()).unwrap();

        let entry = registry.get("00:00:00:00:00:01").unwrap();
        assert_eq!(entry.name, "holger");
        assert_eq!(entry.device_name, "handy");
        assert_eq!(entry.visibility, Visibility::User);
        assert_eq!(entry.ts, 1427737817755);
        assert!(registry.get("00:00:00:00:00:02").is_none());
    }

    #[test]
    fn set_persists_before_returning() {
        let file = registry_file("{}");
        let registry = PersistentUserRegistry::load(file.path()).unwrap();

        registry.set(
            "aa:bb:cc:dd:ee:ff",
            UserEntry {
                name: "olaf".into(),
                device_name: "iphone".into(),
                visibility: Visibility::All,
                ts: 1,
            },
        );

        // A fresh instance only sees what made it to disk.
        let reloaded = PersistentUserRegistry::load(file.path()).unwrap();
        assert_eq!(reloaded.get("aa:bb:cc:dd:ee:ff").unwrap().name, "olaf");
    }

    #[test]
    fn delete_persists_before_returning() {
        let file = registry_file(
            r#"{"aa:bb:cc:dd:ee:ff": {"name": "olaf", "visibility": "all"}}"#,
        );
        let registry = PersistentUserRegistry::load(file.path()).unwrap();
        registry.delete("aa:bb:cc:dd:ee:ff");

        let reloaded = PersistentUserRegistry::load(file.path()).unwrap();
        assert!(reloaded.get("aa:bb:cc:dd:ee:ff").is_none());
    }

    #[test]
    fn invalid_visibility_in_file_is_a_bootstrap_error() {
        let file = registry_file(r#"{"aa:bb:cc:dd:ee:ff": {"name": "x", "visibility": "loud"}}"#);
        assert!(PersistentUserRegistry::load(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_a_bootstrap_error() {
        assert!(PersistentUserRegistry::load("/nonexistent/userDb.json").is_err());
    }
}
