//! Snapshot store: the one snapshot last applied to the registry.

use regsync_core::Snapshot;

/// Holds the last applied snapshot.
///
/// Owned by the reconciliation loop, which is its only writer. Committing
/// overwrites; nothing older than the last commit is kept.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    applied: Snapshot,
    has_ever_been_set: bool,
}

impl SnapshotStore {
    /// Create an empty store; nothing has been applied yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last applied snapshot, or `None` before the first commit.
    pub const fn previous(&self) -> Option<&Snapshot> {
        if self.has_ever_been_set {
            Some(&self.applied)
        } else {
            None
        }
    }

    /// Whether any snapshot has been committed.
    pub const fn has_ever_been_set(&self) -> bool {
        self.has_ever_been_set
    }

    /// Replace the applied snapshot.
    pub fn commit(&mut self, snapshot: Snapshot) {
        self.applied = snapshot;
        self.has_ever_been_set = true;
    }
}
