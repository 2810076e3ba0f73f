//! Initialization states

use std::fmt;

use crate::engine::VersionChange;
use crate::error::StoreError;

/// Where the client is in its initialization lifecycle.
///
/// `Closed → Opening → (MigrationNeeded → Migrating →) Ready`, with `Failed`
/// reachable from any state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState {
    Closed,
    Opening,
    MigrationNeeded(VersionChange),
    Migrating(VersionChange),
    Ready,
    Failed(StoreError),
}

impl InitState {
    pub fn is_ready(&self) -> bool {
        matches!(self, InitState::Ready)
    }

    /// `Ready` or `Failed`.
    pub fn is_settled(&self) -> bool {
        matches!(self, InitState::Ready | InitState::Failed(_))
    }
}

impl fmt::Display for InitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitState::Closed => write!(f, "closed"),
            InitState::Opening => write!(f, "opening"),
            InitState::MigrationNeeded(c) => {
                write!(f, "migration needed (v{} -> v{})", c.old_version, c.new_version)
            }
            InitState::Migrating(c) => {
                write!(f, "migrating (v{} -> v{})", c.old_version, c.new_version)
            }
            InitState::Ready => write!(f, "ready"),
            InitState::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}
