//! In-memory registries for tests and offline tooling. No persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::registry::master::{MasterEntry, MasterRegistry};
use crate::registry::user::{UserEntry, UserRegistry};

#[derive(Default)]
pub struct MemoryMasterRegistry {
    entries: RwLock<HashMap<String, MasterEntry>>,
}

impl MemoryMasterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, mac: &str, entry: MasterEntry) {
        self.entries
            .write()
            .expect("master registry lock poisoned")
            .insert(mac.to_string(), entry);
    }
}

impl MasterRegistry for MemoryMasterRegistry {
    fn get(&self, mac: &str) -> Option<MasterEntry> {
        self.entries.read().expect("master registry lock poisoned").get(mac).cloned()
    }
}

#[derive(Default)]
pub struct MemoryUserRegistry {
    entries: RwLock<HashMap<String, UserEntry>>,
}

impl MemoryUserRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRegistry for MemoryUserRegistry {
    fn get(&self, mac: &str) -> Option<UserEntry> {
        self.entries.read().expect("user registry lock poisoned").get(mac).cloned()
    }

    fn set(&self, mac: &str, entry: UserEntry) {
        self.entries.write().expect("user registry lock poisoned").insert(mac.to_string(), entry);
    }

    fn delete(&self, mac: &str) {
        self.entries.write().expect("user registry lock poisoned").remove(mac);
    }
}
