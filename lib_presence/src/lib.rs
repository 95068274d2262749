// Declare the modules to re-export
pub mod core;
pub mod model;
pub mod registry;

// Re-export the types most callers need
pub use crate::core::change_detector::ChangeDetector;
pub use crate::core::engine::PresenceEngine;
pub use crate::core::locations::{Location, LocationResolver};
pub use crate::core::watchdog::Watchdog;
pub use crate::model::{Device, Person, PresenceSummary, WifiSession};
pub use crate::registry::visibility::Visibility;
