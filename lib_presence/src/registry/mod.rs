pub mod master;
pub mod memory;
pub mod user;
pub mod visibility;

pub use master::{FileMasterRegistry, MasterEntry, MasterRegistry};
pub use memory::{MemoryMasterRegistry, MemoryUserRegistry};
pub use user::{PersistentUserRegistry, UserEntry, UserRegistry};
pub use visibility::Visibility;

use std::path::PathBuf;
use thiserror::Error;

/// Failure to bring a registry file up at startup. Bootstrap-fatal: the
/// process must not start without its registries.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unable to read registry file {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse registry file {file}: {source}")]
    Parse {
        file: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Whether the second-least-significant bit of the first octet is set,
/// marking a software-assigned (randomized) hardware address.
/// Expects the mac in the format e.g. "20:c9:d0:7a:fa:31".
/// https://en.wikipedia.org/wiki/MAC_address
pub fn is_locally_administered(mac: &str) -> bool {
    // 00000010
    const MASK: u8 = 1 << 1;

    let first_octet = mac.get(..2).unwrap_or("");
    u8::from_str_radix(first_octet, 16)
        .map(|value| value & MASK == MASK)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_locally_administered_macs() {
        assert!(is_locally_administered("06:00:00:00:00:00"));
        assert!(is_locally_administered("62:01:0f:b5:f2:d9"));
        assert!(!is_locally_administered("20:c9:d0:7a:fa:31"));
    }

    #[test]
    fn garbage_is_not_locally_administered() {
        assert!(!is_locally_administered(""));
        assert!(!is_locally_administered("zz:00:00:00:00:00"));
    }
}
