// ── MAC address identity ──

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacAddress(String);

impl MacAddress {
    /// Create a normalized MAC address from any common format.
    /// Accepts colon-separated, dash-separated (`00-1A-3F-87-0F-7A`, as the
    /// switch reports them), or bare 12-digit hex.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let lowered = raw.as_ref().trim().to_lowercase().replace('-', ":");
        if lowered.len() == 12 && lowered.chars().all(|c| c.is_ascii_hexdigit()) {
            let pairs: Vec<&str> = (0..6)
                .filter_map(|i| lowered.get(i * 2..i * 2 + 2))
                .collect();
            return Self(pairs.join(":"));
        }
        Self(lowered)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mac_address_normalizes_dashes() {
        let mac = MacAddress::new("00-1A-3F-87-0F-7A");
        assert_eq!(mac.as_str(), "00:1a:3f:87:0f:7a");
    }

    #[test]
    fn mac_address_normalizes_case() {
        let mac = MacAddress::new("AA:BB:CC:DD:EE:FF");
        assert_eq!(mac.as_str(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn mac_address_splits_bare_hex() {
        let mac: MacAddress = "AABBCCDDEEFF".parse().unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }
}
