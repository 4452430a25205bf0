//! Describes which servers are suitable for a given operation.

use std::{fmt, sync::Arc};

use crate::server::ServerDescription;

/// Specifies how the driver should route an operation to members of a replica set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadPreference {
    /// Only route this operation to the primary.
    Primary,
    /// Route this operation to the primary if available, falling back to a secondary.
    PrimaryPreferred,
    /// Only route this operation to a secondary.
    Secondary,
    /// Route this operation to a secondary if available, falling back to the primary.
    SecondaryPreferred,
    /// Route this operation to whichever member has the least network latency.
    Nearest,
}

impl Default for ReadPreference {
    fn default() -> Self {
        ReadPreference::Primary
    }
}

impl ReadPreference {
    /// Whether this preference is exactly `Primary`.
    pub fn is_primary(self) -> bool {
        matches!(self, ReadPreference::Primary)
    }
}

/// A predicate used to filter servers considered suitable for an operation. A server is
/// suitable if `predicate(description)` returns `true`.
pub type Predicate = Arc<dyn Send + Sync + Fn(&ServerDescription) -> bool>;

/// Describes which servers are suitable for a given operation.
#[derive(Clone)]
pub enum SelectionCriteria {
    /// A read preference describing the suitable servers based on server type.
    ReadPreference(ReadPreference),
    /// An arbitrary predicate used to filter suitable servers. Used by the selector resolver to
    /// express "the one server this cursor is pinned to" and "any writable-or-eligible-secondary
    /// server" without inventing a new `ReadPreference` variant for each.
    Predicate(Predicate),
}

impl fmt::Debug for SelectionCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionCriteria::ReadPreference(rp) => {
                f.debug_tuple("ReadPreference").field(rp).finish()
            }
            SelectionCriteria::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<ReadPreference> for SelectionCriteria {
    fn from(read_preference: ReadPreference) -> Self {
        SelectionCriteria::ReadPreference(read_preference)
    }
}

impl SelectionCriteria {
    /// Returns the read preference, if this criteria is one.
    pub fn as_read_pref(&self) -> Option<&ReadPreference> {
        match self {
            SelectionCriteria::ReadPreference(rp) => Some(rp),
            SelectionCriteria::Predicate(_) => None,
        }
    }

    /// Whether this criteria is exactly `ReadPreference::Primary`.
    pub fn is_read_pref_primary(&self) -> bool {
        matches!(self.as_read_pref(), Some(rp) if rp.is_primary())
    }
}
