//! Smoke runner: drives a full parse -> aggregate -> change-check pass over
//! fixture data against in-memory registries and prints the document that
//! would be published. Exits non-zero when any expectation fails.

use std::sync::Arc;

use anyhow::{ensure, Result};

use lib_presence::core::change_detector::ChangeDetector;
use lib_presence::core::engine::PresenceEngine;
use lib_presence::core::locations::{Location, LocationResolver};
use lib_presence::registry::master::MasterEntry;
use lib_presence::registry::memory::{MemoryMasterRegistry, MemoryUserRegistry};
use lib_presence::registry::user::{UserEntry, UserRegistry as _};
use lib_presence::registry::visibility::Visibility;

const SNAPSHOT: &str = r#"
{
  "1": {"vlan": "default", "ip": "10.1.1.1", "ap": 1, "mac": "00:00:00:00:00:01"},
  "2": {"vlan": "default", "ip": "10.1.1.2", "ap": 1, "mac": "00:00:00:00:00:02"},
  "3": {"vlan": "default", "ip": "10.1.1.3", "ap": 2, "mac": "00:00:00:00:00:03"},
  "4": {"vlan": "default", "ip": "10.1.1.4", "ap": 2, "mac": "00:00:00:00:00:04"},
  "5": {"vlan": "guest",   "ip": "10.1.1.5", "ap": 9, "mac": "00:00:00:00:00:05"},
  "6": {"vlan": "default", "ip": "10.1.1.6", "ap": 1, "mac": "00:00:00:00:00:06"}
}
"#;

fn main() -> Result<()> {
    let master = Arc::new(MemoryMasterRegistry::new());
    let user = Arc::new(MemoryUserRegistry::new());

    user.set("00:00:00:00:00:01", entry("anna", "laptop", Visibility::All));
    user.set("00:00:00:00:00:02", entry("bert", "phone", Visibility::User));
    user.set("00:00:00:00:00:03", entry("carol", "tablet", Visibility::Anon));
    user.set("00:00:00:00:00:04", entry("dieter", "watch", Visibility::Ignore));
    master.insert(
        "00:00:00:00:00:06",
        MasterEntry {
            user: entry("door-pi", "", Visibility::CriticalInfrastructure),
            device_type: "raspberry".into(),
            powered_while_closed_warning: true,
        },
    );

    let engine = PresenceEngine::new(
        LocationResolver::new(vec![
            Location { name: "Bar".into(), ids: vec![1] },
            Location { name: "Workshop".into(), ids: vec![2] },
        ]),
        master,
        user,
    );

    let sessions = engine
        .parse_snapshot(SNAPSHOT.as_bytes())
        .ok_or_else(|| anyhow::anyhow!("fixture snapshot did not parse"))?;
    let summary = engine.aggregate(&sessions);

    println!("published document:");
    println!("{}", serde_json::to_string_pretty(&summary)?);

    ensure!(summary.device_count == 6, "deviceCount: {}", summary.device_count);
    ensure!(
        summary.unknown_devices_count == 1,
        "unknownDevicesCount: {}",
        summary.unknown_devices_count
    );
    ensure!(summary.people_count == 3, "peopleCount: {}", summary.people_count);
    ensure!(summary.people.len() == 2, "len(people): {}", summary.people.len());
    ensure!(summary.people[0].name == "anna", "people not sorted by name");
    ensure!(summary.people[0].devices[0].location == "Bar", "location resolution failed");
    ensure!(summary.people[1].devices.is_empty(), "user visibility must hide devices");

    // A second identical pass must fingerprint identically and be
    // suppressed.
    let mut detector = ChangeDetector::new();
    ensure!(detector.check(&summary), "first pass must publish");
    let again = engine.aggregate(&sessions);
    ensure!(!detector.check(&again), "identical pass must be suppressed");

    println!("all aggregation expectations hold");
    Ok(())
}

fn entry(name: &str, device_name: &str, visibility: Visibility) -> UserEntry {
    UserEntry { name: name.into(), device_name: device_name.into(), visibility, ts: 0 }
}
