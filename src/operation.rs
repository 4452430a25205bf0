//! The `Operation` contract: the request the coordinator executes.

use std::future::Future;

use crate::{
    aspect::Aspects, error::Result, selection_criteria::SelectionCriteria, server::{Server, ServerAddress},
    session::Session,
};

/// The mutable options bag the coordinator annotates during execution.
///
/// Concrete operations may embed additional command-specific fields alongside this one; the
/// coordinator only ever touches `will_retry_write`.
#[derive(Clone, Debug, Default)]
pub struct OperationOptions {
    will_retry_write: bool,
}

impl OperationOptions {
    /// Whether the coordinator has armed a write retry for the attempt about to run.
    pub fn will_retry_write(&self) -> bool {
        self.will_retry_write
    }

    /// Marks that a write retry has been armed for the attempt about to run. Called by the
    /// coordinator only; concrete operations should treat this as read-only.
    pub(crate) fn set_will_retry_write(&mut self, value: bool) {
        self.will_retry_write = value;
    }
}

/// An operation the coordinator can execute against a selected server.
///
/// Operations are polymorphic by their [`Aspects`] flag set rather than by a class hierarchy:
/// a cursor-continuing `getMore` and an initial `find` are both `Operation`s, distinguished only
/// by which aspects they set.
pub trait Operation: Send + Sync {
    /// What the operation produces on success.
    type Output: Send;

    /// A short, human-readable name used only for log events (never sent on the wire).
    fn name(&self) -> &str;

    /// Checks that this operation instance is well-formed before anything else runs (e.g. that
    /// it does not combine aspects its author never intended together). The default
    /// implementation accepts every instance; concrete operations override this only when they
    /// have something worth rejecting before a server is even selected.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// The capability flags this operation advertises to the coordinator.
    fn aspects(&self) -> Aspects;

    /// The read preference to select a server with. `None` is treated as `Primary`.
    fn selection_criteria(&self) -> Option<&SelectionCriteria>;

    /// The server this operation is pinned to, set after a cursor's opening execution. Only
    /// meaningful when [`Aspects::CURSOR_ITERATING`] is set.
    fn pinned_server(&self) -> Option<&ServerAddress> {
        None
    }

    /// Whether this operation's author allows it to be retried as a read. Ignored unless
    /// [`Aspects::RETRYABLE`] and [`Aspects::READ`] are both set.
    fn can_retry_read(&self) -> bool {
        true
    }

    /// Whether this operation's author allows it to be retried as a write. Ignored unless
    /// [`Aspects::RETRYABLE`] and [`Aspects::WRITE`] are both set.
    fn can_retry_write(&self) -> bool {
        true
    }

    /// Whether this operation may be routed to a writable secondary-eligible server rather than
    /// strictly following its read preference (used by some bulk-write fallback paths).
    fn try_secondary_write(&self) -> bool {
        false
    }

    /// Mutable access to the options bag the coordinator annotates before a retried write.
    fn options_mut(&mut self) -> &mut OperationOptions;

    /// Runs this operation against `server`, optionally attaching `session`. The one suspension
    /// point that actually crosses the wire.
    fn execute(
        &self,
        server: &Server,
        session: Option<&mut Session>,
    ) -> impl Future<Output = Result<Self::Output>> + Send;
}
