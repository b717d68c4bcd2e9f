//! Canonical representation of a chain head.

use std::fmt;

/// Identifier of the most recently observed ledger checkpoint.
///
/// Wraps the ledger's record sequence number. Comparison is numeric on the
/// underlying integer; the hex text form produced by [`Display`](fmt::Display)
/// is presentation only and never participates in ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Head(u64);

impl Head {
    /// Sentinel returned by a fetch that found no qualifying head record.
    ///
    /// Version 0 is the genesis bootstrap record, which a live chain's
    /// recent-transactions window never reports as its newest block-metadata
    /// entry. The sentinel never becomes a cached head and never produces a
    /// notification.
    pub const EMPTY: Head = Head(0);

    pub fn new(version: u64) -> Self {
        Self(version)
    }

    /// Underlying ledger sequence number.
    pub fn version(self) -> u64 {
        self.0
    }

    /// Whether this is the "no observable progress" sentinel.
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl fmt::Display for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for Head {
    fn from(version: u64) -> Self {
        Self(version)
    }
}
