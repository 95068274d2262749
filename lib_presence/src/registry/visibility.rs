use serde::{Deserialize, Serialize};

/// Owner-chosen visibility category for a registered device.
///
/// The set is closed: an unknown string fails deserialization instead of
/// silently defaulting, so a typo in a registry file or a web form is caught
/// at the boundary. The infrastructure variants mark fixed equipment and are
/// excluded from presence aggregation entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    /// Not shown at all.
    Ignore,
    /// Doesn't show the name, but increments the people count.
    Anon,
    /// Shows the name, but not the device name(s).
    User,
    /// Shows the name and the device names.
    All,
    Infrastructure,
    DeprecatedInfrastructure,
    UserInfrastructure,
    ImportantInfrastructure,
    CriticalInfrastructure,
}

impl Visibility {
    /// True for the categories reserved for fixed equipment.
    pub fn is_infrastructure(self) -> bool {
        matches!(
            self,
            Visibility::Infrastructure
                | Visibility::DeprecatedInfrastructure
                | Visibility::UserInfrastructure
                | Visibility::ImportantInfrastructure
                | Visibility::CriticalInfrastructure
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_kebab_case() {
        assert_eq!(serde_json::to_string(&Visibility::Ignore).unwrap(), r#""ignore""#);
        assert_eq!(
            serde_json::to_string(&Visibility::DeprecatedInfrastructure).unwrap(),
            r#""deprecated-infrastructure""#
        );
        let parsed: Visibility = serde_json::from_str(r#""critical-infrastructure""#).unwrap();
        assert_eq!(parsed, Visibility::CriticalInfrastructure);
    }

    #[test]
    fn unknown_values_fail_validation() {
        assert!(serde_json::from_str::<Visibility>(r#""show""#).is_err());
        assert!(serde_json::from_str::<Visibility>(r#""""#).is_err());
        assert!(serde_json::from_str::<Visibility>("3").is_err());
    }

    #[test]
    fn infrastructure_predicate_covers_all_variants() {
        for v in [
            Visibility::Infrastructure,
            Visibility::DeprecatedInfrastructure,
            Visibility::UserInfrastructure,
            Visibility::ImportantInfrastructure,
            Visibility::CriticalInfrastructure,
        ] {
            assert!(v.is_infrastructure());
        }
        for v in [Visibility::Ignore, Visibility::Anon, Visibility::User, Visibility::All] {
            assert!(!v.is_infrastructure());
        }
    }
}
