//! Identifier types

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ulid::{Generator, Ulid};
use uuid::Uuid;

/// Unique undoable-action identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub Ulid);

impl ActionId {
    /// Wrap an existing ULID
    #[inline]
    #[must_use]
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Monotonic id source
///
/// Ids produced within the same millisecond are strictly increasing, so rapid
/// bursts of `record` calls never collide. Clearing a ledger does not reset
/// the generator; ids issued afterwards stay above every earlier id.
pub struct ActionIdGenerator {
    inner: Generator,
}

impl Default for ActionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionIdGenerator").finish_non_exhaustive()
    }
}

impl ActionIdGenerator {
    /// Create a new generator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Generator::new(),
        }
    }

    /// Produce the next id
    pub fn next_id(&mut self) -> ActionId {
        // The random component only overflows after 2^80 ids in one millisecond.
        match self.inner.generate() {
            Ok(ulid) => ActionId(ulid),
            Err(_) => ActionId(Ulid::new()),
        }
    }
}

/// Identifier of a single on-screen prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToastId(pub Uuid);

impl ToastId {
    /// Allocate a fresh toast id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ToastId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ToastId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "toast-{}", self.0.simple())
    }
}
