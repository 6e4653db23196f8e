//! Transaction age

use crate::Tick;
use std::fmt;

/// Birth time of a transaction, compared by wait-die
///
/// The tick orders transactions; `seq` is the begin order inside one tick,
/// so two transactions started on the same line still have distinct ages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp {
    /// Birth tick
    pub tick: Tick,
    /// Begin order within the tick
    pub seq: u32,
}

impl Timestamp {
    /// Create a timestamp
    pub fn new(tick: Tick, seq: u32) -> Self {
        Self { tick, seq }
    }

    /// Check if `self` was born before `other`
    pub fn is_older_than(&self, other: &Timestamp) -> bool {
        self < other
    }
}

impl From<Tick> for Timestamp {
    fn from(tick: Tick) -> Self {
        Self { tick, seq: 0 }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seq == 0 {
            write!(f, "{}", self.tick)
        } else {
            write!(f, "{}.{}", self.tick, self.seq)
        }
    }
}
