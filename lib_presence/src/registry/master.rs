use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::registry::user::UserEntry;
use crate::registry::RegistryError;

/// Administrator-curated registry entry. Embeds the identity fields of a
/// [`UserEntry`] and always wins over the user registry for the same address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterEntry {
    #[serde(flatten)]
    pub user: UserEntry,
    #[serde(rename = "device-type", default)]
    pub device_type: String,
    #[serde(rename = "powered-while-closed-warning", default)]
    pub powered_while_closed_warning: bool,
}

/// Read-only mac -> curated identity lookup.
pub trait MasterRegistry: Send + Sync {
    fn get(&self, mac: &str) -> Option<MasterEntry>;
}

/// Master registry loaded once at startup, immutable thereafter.
pub struct FileMasterRegistry {
    entries: HashMap<String, MasterEntry>,
}

impl FileMasterRegistry {
    /// An unreadable or unparsable file is a bootstrap error: the process
    /// must not start without it.
    pub fn load(file: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let file = file.as_ref();
        let raw = fs::read(file)
            .map_err(|source| RegistryError::Io { file: file.to_path_buf(), source })?;
        let entries: HashMap<String, MasterEntry> = serde_json::from_slice(&raw)
            .map_err(|source| RegistryError::Parse { file: file.to_path_buf(), source })?;
        log::info!("Loaded {} master registry entries from {}", entries.len(), file.display());
        Ok(Self { entries })
    }
}

impl MasterRegistry for FileMasterRegistry {
    fn get(&self, mac: &str) -> Option<MasterEntry> {
        self.entries.get(mac).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::visibility::Visibility;
    use std::io::Write as _;

    #[test]
    fn parses_flattened_identity_and_device_tags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{
  "b8:27:eb:00:00:01": {
    "name": "door-pi",
    "device-type": "raspberry",
    "visibility": "critical-infrastructure",
    "powered-while-closed-warning": true
  }
}"#,
        )
        .unwrap();
        file.flush().unwrap();

        let registry = FileMasterRegistry::load(file.path()).unwrap();
        let entry = registry.get("b8:27:eb:00:00:01").unwrap();
        assert_eq!(entry.user.name, "door-pi");
        assert_eq!(entry.user.visibility, Visibility::CriticalInfrastructure);
        assert_eq!(entry.device_type, "raspberry");
        assert!(entry.powered_while_closed_warning);
        assert!(entry.user.device_name.is_empty());
        assert!(registry.get("b8:27:eb:00:00:02").is_none());
    }
}
