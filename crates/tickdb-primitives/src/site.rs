//! Site identifier

use crate::{PrimitiveError, PrimitiveResult, SITE_COUNT};
use std::fmt;

/// Identifier of one of the fixed sites, always in `1..=SITE_COUNT`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct SiteId(u8);

impl SiteId {
    /// Validate a raw site number
    pub fn new(raw: i64) -> PrimitiveResult<Self> {
        if raw < 1 || raw > SITE_COUNT as i64 {
            return Err(PrimitiveError::InvalidSiteId(raw));
        }
        Ok(Self(raw as u8))
    }

    /// Get the raw site number
    pub fn get(&self) -> u8 {
        self.0
    }

    /// Map any number onto a site as `n mod SITE_COUNT + 1`
    pub fn wrapping(n: u32) -> Self {
        Self((n % SITE_COUNT as u32) as u8 + 1)
    }

    /// All sites in ascending order, which is also the replica visiting order
    pub fn all() -> impl Iterator<Item = SiteId> {
        (1..=SITE_COUNT).map(SiteId)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for SiteId {
    type Error = PrimitiveError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}
