//! Presence aggregation: resolves every session of a snapshot against the
//! two-tier registry, applies the owner-chosen visibility policy and builds
//! the deduplicated summary that gets published.
//!
//! The visibility checks in [`PresenceEngine::aggregate`] are an ordered
//! sequence, not independent branches. The people count is tied to the first
//! device seen for a name, which produces a documented boundary case (see
//! the `ignored_first_device_is_shown_but_not_counted` test). Do not reorder.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::locations::LocationResolver;
use crate::model::{Device, Person, PresenceSummary, WifiSession};
use crate::registry::master::MasterRegistry;
use crate::registry::user::{UserEntry, UserRegistry};
use crate::registry::visibility::Visibility;

/// Per-name accumulator for one aggregation pass.
#[derive(Default)]
struct PersonAccumulator {
    hide_name: bool,
    show_devices: bool,
    devices: Vec<Device>,
}

pub struct PresenceEngine {
    resolver: LocationResolver,
    master: Arc<dyn MasterRegistry>,
    user: Arc<dyn UserRegistry>,
    // Replaced wholesale on every accepted snapshot. Readers clone the Arc
    // under a short read guard and never see a partially updated list.
    sessions: RwLock<Arc<Vec<WifiSession>>>,
}

impl PresenceEngine {
    pub fn new(
        resolver: LocationResolver,
        master: Arc<dyn MasterRegistry>,
        user: Arc<dyn UserRegistry>,
    ) -> Self {
        Self { resolver, master, user, sessions: RwLock::new(Arc::new(Vec::new())) }
    }

    /// Decodes a snapshot document (session id -> session). Malformed input
    /// is not fatal: it is logged together with the payload and the pass is
    /// skipped by returning `None`.
    pub fn parse_snapshot(&self, raw: &[u8]) -> Option<Vec<WifiSession>> {
        match serde_json::from_slice::<HashMap<String, WifiSession>>(raw) {
            Ok(sessions) => Some(sessions.into_values().collect()),
            Err(err) => {
                log::error!(
                    "Unable to decode wifi session snapshot: {} (payload: {})",
                    err,
                    String::from_utf8_lossy(raw)
                );
                None
            }
        }
    }

    /// Runs one aggregation pass. Input order is irrelevant (the snapshot is
    /// map-keyed); the output lists are re-sorted so the published document
    /// and its fingerprint are deterministic.
    pub fn aggregate(&self, sessions: &[WifiSession]) -> PresenceSummary {
        let mut summary = PresenceSummary::default();
        let mut by_name: HashMap<String, PersonAccumulator> = HashMap::new();

        for session in sessions {
            summary.device_count += 1;

            let info: UserEntry = match self.master.get(&session.mac) {
                Some(entry) => entry.user,
                None => match self.user.get(&session.mac) {
                    Some(entry) => entry,
                    None => {
                        // nothing found for this mac
                        summary.unknown_devices_count += 1;
                        continue;
                    }
                },
            };

            // Fixed equipment never reaches any count or list beyond the
            // device total.
            if info.visibility.is_infrastructure() {
                continue;
            }

            let accumulator = by_name.entry(info.name.clone()).or_default();
            accumulator.devices.push(Device {
                name: info.device_name.clone(),
                location: self.locate(session),
            });

            if info.visibility == Visibility::Ignore {
                accumulator.hide_name = true;
                continue;
            }

            // Gated on the first device seen for this name, so an earlier
            // `ignore` device swallows the increment even when a later
            // device turns the person visible again.
            if accumulator.devices.len() == 1 {
                summary.people_count += 1;
            }

            match info.visibility {
                Visibility::Anon => accumulator.hide_name = true,
                Visibility::User => {
                    accumulator.hide_name = false;
                    accumulator.show_devices = false;
                }
                Visibility::All => {
                    accumulator.hide_name = false;
                    accumulator.show_devices = true;
                }
                _ => {}
            }
        }

        for (name, accumulator) in by_name {
            if accumulator.hide_name {
                continue;
            }

            let mut devices =
                if accumulator.show_devices { accumulator.devices } else { Vec::new() };
            devices.sort_by(|a, b| a.name.cmp(&b.name));
            summary.people.push(Person { name, devices });
        }
        summary.people.sort_by(|a, b| a.name.cmp(&b.name));

        summary
    }

    /// A zone label supplied by the controller wins over the attachment
    /// point id; an unknown attachment point yields an empty string.
    fn locate(&self, session: &WifiSession) -> String {
        if let Some(label) = session.location.as_deref() {
            if !label.is_empty() {
                return label.to_string();
            }
        }
        match session.ap {
            Some(ap) => self.resolver.resolve(ap),
            None => String::new(),
        }
    }

    /// Replaces the retained session list with the latest accepted snapshot.
    pub fn replace_sessions(&self, sessions: Vec<WifiSession>) {
        *self.sessions.write().expect("session list lock poisoned") = Arc::new(sessions);
    }

    /// The latest accepted session list; an immutable handle shared with
    /// concurrent request handlers.
    pub fn current_sessions(&self) -> Arc<Vec<WifiSession>> {
        Arc::clone(&self.sessions.read().expect("session list lock poisoned"))
    }

    /// Finds the session entry for the given v4 or v6 address.
    pub fn find_by_address(&self, address: &str) -> Option<WifiSession> {
        let sessions = self.current_sessions();
        if address.matches(':').count() < 2 {
            // v4
            sessions.iter().find(|session| session.ip == address).cloned()
        } else {
            // v6
            sessions.iter().find(|session| session.ipv6.iter().any(|v6| v6 == address)).cloned()
        }
    }

    /// Sessions matching neither registry, for the unknown-device tooling.
    pub fn unknown_sessions(&self, sessions: &[WifiSession]) -> Vec<WifiSession> {
        sessions
            .iter()
            .filter(|session| {
                self.master.get(&session.mac).is_none() && self.user.get(&session.mac).is_none()
            })
            .cloned()
            .collect()
    }
}
