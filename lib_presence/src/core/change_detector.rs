use sha2::{Digest, Sha256};

use crate::model::PresenceSummary;

/// Suppresses republication of summaries whose canonical serialization is
/// unchanged since the previous pass. Owned by the single ingestion
/// consumer, so no locking is involved.
#[derive(Default)]
pub struct ChangeDetector {
    last_fingerprint: Option<[u8; 32]>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `summary` differs from the previous pass; records the new
    /// fingerprint in that case.
    pub fn check(&mut self, summary: &PresenceSummary) -> bool {
        let fingerprint = fingerprint(summary);
        if self.last_fingerprint == Some(fingerprint) {
            log::debug!("Nothing changed in the presence summary, skipping publish");
            return false;
        }
        log::debug!("Presence summary changed, fingerprint {}", hex::encode(fingerprint));
        self.last_fingerprint = Some(fingerprint);
        true
    }
}

// The summary lists are sorted by the aggregation pass, which makes the
// serialization canonical.
fn fingerprint(summary: &PresenceSummary) -> [u8; 32] {
    let canonical = serde_json::to_vec(summary).expect("presence summary always serializes");
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Device, Person};

    fn summary(people: u32) -> PresenceSummary {
        PresenceSummary {
            people: vec![Person {
                name: "anna".into(),
                devices: vec![Device { name: "laptop".into(), location: "Bar".into() }],
            }],
            people_count: people,
            device_count: 3,
            unknown_devices_count: 1,
        }
    }

    #[test]
    fn first_pass_always_publishes() {
        let mut detector = ChangeDetector::new();
        assert!(detector.check(&PresenceSummary::default()));
    }

    #[test]
    fn identical_summaries_are_suppressed() {
        let mut detector = ChangeDetector::new();
        assert!(detector.check(&summary(1)));
        assert!(!detector.check(&summary(1)));
        assert!(!detector.check(&summary(1)));
    }

    #[test]
    fn any_difference_publishes_again() {
        let mut detector = ChangeDetector::new();
        assert!(detector.check(&summary(1)));
        assert!(detector.check(&summary(2)));
        // and going back is a change too
        assert!(detector.check(&summary(1)));
    }
}
