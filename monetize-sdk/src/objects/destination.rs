use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Opaque identifier of a payment target (a payment pointer).
///
/// Nothing about its structure is interpreted; two destinations are the same
/// target exactly when their strings are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(CompactString);

impl Destination {
    pub fn new(value: impl Into<CompactString>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// An empty destination never identifies a target.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Destination {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Destination {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for Destination {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_destination_is_empty() {
        assert!(Destination::default().is_empty());
        assert!(Destination::from("  ").is_empty());
        assert!(!Destination::from("$wallet.example.com/alice").is_empty());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let destination = Destination::from("$wallet.example.com/alice");
        let json = serde_json::to_string(&destination).unwrap();
        assert_eq!(json, "\"$wallet.example.com/alice\"");
    }
}
