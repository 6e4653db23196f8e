//! Transaction identifier

use crate::{PrimitiveError, PrimitiveResult};
use std::fmt;
use std::str::FromStr;

/// Script-level transaction name such as `T1`
///
/// Ordering is lexical and only used for deterministic listings; age
/// comparisons use the transaction timestamp instead.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct TxId(String);

impl TxId {
    /// Create a transaction id from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TxId {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> PrimitiveResult<Self> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(PrimitiveError::InvalidTransaction(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for TxId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_id_parse() {
        let id: TxId = "T1".parse().unwrap();
        assert_eq!(id.as_str(), "T1");
        assert_eq!(id, TxId::from("T1"));
        assert_eq!(id.to_string(), "T1");
    }

    #[test]
    fn test_tx_id_rejects_bad_names() {
        assert!("".parse::<TxId>().is_err());
        assert!("T(1".parse::<TxId>().is_err());
        assert!("T,1".parse::<TxId>().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_tx_id_serde_transparent() {
        let json = serde_json::to_string(&TxId::from("T7")).unwrap();
        assert_eq!(json, "\"T7\"");
    }
}
