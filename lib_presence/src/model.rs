use serde::{Deserialize, Serialize};

/// One currently attached wireless client, decoded from an inbound snapshot.
///
/// The snapshot document carries far more per-session detail than we care
/// about; only the fields below are kept, everything else is ignored. The
/// session list is replaced wholesale on every accepted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WifiSession {
    /// IPv4 address, may be empty when the client is v6-only.
    #[serde(default)]
    pub ip: String,
    /// All known IPv6 addresses of the client.
    #[serde(default)]
    pub ipv6: Vec<String>,
    /// Hardware address in colon-hex form, e.g. "20:c9:d0:7a:fa:31".
    pub mac: String,
    #[serde(default)]
    pub vlan: String,
    /// Numeric attachment-point identifier, resolved to a zone name.
    #[serde(default)]
    pub ap: Option<u32>,
    /// Zone label supplied directly by the controller. Wins over `ap`.
    #[serde(default)]
    pub location: Option<String>,
}

/// One device descriptor inside a published person entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub location: String,
}

/// One revealed person in the published summary. `devices` is empty when the
/// owner chose to show the name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub devices: Vec<Device>,
}

/// The published presence document. `people` is always present, an empty
/// pass yields an empty list rather than a missing field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSummary {
    pub people: Vec<Person>,
    pub people_count: u32,
    pub device_count: u32,
    pub unknown_devices_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_keeps_published_schema_stable() {
        let json = serde_json::to_string(&PresenceSummary::default()).unwrap();
        assert_eq!(
            json,
            r#"{"people":[],"peopleCount":0,"deviceCount":0,"unknownDevicesCount":0}"#
        );
    }

    #[test]
    fn session_decodes_both_location_forms() {
        let by_ap: WifiSession =
            serde_json::from_str(r#"{"mac":"aa:bb:cc:dd:ee:ff","ip":"10.1.1.9","ap":4}"#).unwrap();
        assert_eq!(by_ap.ap, Some(4));
        assert!(by_ap.location.is_none());
        assert!(by_ap.ipv6.is_empty());

        let by_label: WifiSession = serde_json::from_str(
            r#"{"mac":"aa:bb:cc:dd:ee:ff","ipv6":["fe80::1"],"location":"Lounge"}"#,
        )
        .unwrap();
        assert_eq!(by_label.location.as_deref(), Some("Lounge"));
        assert_eq!(by_label.ipv6, vec!["fe80::1".to_string()]);
        assert!(by_label.ip.is_empty());
    }
}
