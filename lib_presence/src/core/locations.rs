use serde::{Deserialize, Serialize};

/// One named zone and the attachment points that belong to it. Loaded from
/// the config file once at startup, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub ids: Vec<u32>,
}

/// Static attachment-point -> zone-name table. First match wins.
pub struct LocationResolver {
    locations: Vec<Location>,
}

impl LocationResolver {
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations }
    }

    /// Empty string when no zone claims the attachment point.
    pub fn resolve(&self, ap: u32) -> String {
        for location in &self.locations {
            if location.ids.contains(&ap) {
                return location.name.clone();
            }
        }
        String::new()
    }
}
