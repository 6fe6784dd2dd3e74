//! Domain primitives: TimeMs, WalletAddress.

use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Shift forward by whole days.
    pub fn plus_days(&self, days: i64) -> Self {
        TimeMs(self.0 + days * 86_400_000)
    }

    /// RFC 3339 rendering used in API responses.
    pub fn to_rfc3339(&self) -> String {
        chrono::DateTime::<chrono::Utc>::from_timestamp_millis(self.0)
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            .unwrap_or_default()
    }

    /// Parse an RFC 3339 timestamp.
    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| TimeMs(dt.timestamp_millis()))
    }
}

/// Wallet address identifying a user. Comparison is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Create a WalletAddress from a string, trimming surrounding whitespace.
    pub fn new(addr: impl Into<String>) -> Self {
        WalletAddress(addr.into().trim().to_string())
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the address is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Case-insensitive comparison against another address.
    pub fn matches(&self, other: &WalletAddress) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl PartialEq for WalletAddress {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for WalletAddress {}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_case_insensitive() {
        let a = WalletAddress::new("0xAbCdEf");
        let b = WalletAddress::new("0xabcdef");
        assert_eq!(a, b);
        assert!(a.matches(&b));
        assert_ne!(a, WalletAddress::new("0xabcdee"));
    }

    #[test]
    fn test_wallet_address_trims() {
        let a = WalletAddress::new("  0x1  ");
        assert_eq!(a.as_str(), "0x1");
        assert!(WalletAddress::new("   ").is_empty());
    }

    #[test]
    fn test_timems_plus_days() {
        let t = TimeMs::new(0).plus_days(3);
        assert_eq!(t.as_ms(), 3 * 86_400_000);
    }

    #[test]
    fn test_timems_rfc3339_roundtrip() {
        let t = TimeMs::parse_rfc3339("2024-01-15T10:30:00.250Z").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-01-15T10:30:00.250Z");
        assert!(TimeMs::parse_rfc3339("not a date").is_none());
    }

    #[test]
    fn test_timems_ordering() {
        let t1 = TimeMs::new(1000);
        let t2 = TimeMs::new(2000);
        assert!(t1 < t2);
    }
}
