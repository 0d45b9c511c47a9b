//! ID types for players.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a streaming player.
///
/// Passed to stop observers so a manager can tell which player finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(u64);

impl PlayerId {
    /// Null/invalid player ID.
    pub const NULL: Self = Self(0);

    /// Creates a player ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks if this is a valid (non-null) player ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Player ID generator.
#[derive(Debug)]
pub struct PlayerIdGenerator {
    next_id: AtomicU64,
}

impl Default for PlayerIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerIdGenerator {
    /// Create a new generator. The first ID handed out is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Generate a new unique player ID.
    pub fn next(&self) -> PlayerId {
        PlayerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}
