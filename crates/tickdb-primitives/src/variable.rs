//! Variable identifier

use crate::{PrimitiveError, PrimitiveResult};
use std::fmt;
use std::str::FromStr;

/// Name of a data item such as `x4`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct VarId(String);

impl VarId {
    /// Create the canonical variable `x{index}`
    pub fn indexed(index: u32) -> Self {
        Self(format!("x{index}"))
    }

    /// Get the name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric suffix of a canonical `x{n}` name
    pub fn index(&self) -> Option<u32> {
        self.0.strip_prefix('x')?.parse().ok()
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VarId {
    type Err = PrimitiveError;

    /// Any identifier-like token is accepted; whether a site hosts it is a
    /// catalog question.
    fn from_str(s: &str) -> PrimitiveResult<Self> {
        let mut chars = s.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return Err(PrimitiveError::InvalidVariable(s.to_string())),
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(PrimitiveError::InvalidVariable(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}
