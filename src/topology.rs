//! The `Topology` collaborator contract.
//!
//! Discovery, server monitoring, and connection pooling are owned entirely outside this crate;
//! the core only ever calls the handful of methods below.

use std::future::Future;

use crate::{
    error::Result,
    selection_criteria::SelectionCriteria,
    server::{Server, ServerAddress},
    session::{Session, SessionOwner},
};

/// Wire version below which a server's feature set is not supported at all.
pub const UNKNOWN: i32 = 0;
/// Wire version at which servers speak `OP_MSG` and support the retryable-read protocol.
pub const SUPPORTS_OP_MSG: i32 = 6;
/// Wire version at which replica sets support multi-statement transactions.
pub const REPLICA_SET_TRANSACTIONS: i32 = 7;
/// Wire version at which sharded clusters support multi-statement transactions.
pub const SHARDED_TRANSACTIONS: i32 = 8;
/// Wire version corresponding to MongoDB 5.0, the minimum for snapshot reads.
pub const WIRE_VERSION_50: i32 = 13;
/// The minimum wire version this core supports talking to at all.
pub const MIN_SUPPORTED_WIRE_VERSION: i32 = SUPPORTS_OP_MSG;

/// The cluster view the core selects servers and sessions against.
///
/// Implementations own discovery, server monitoring, the connection pool, and the session
/// pool. The core treats every method here as a suspension point: implementations are free to
/// perform network I/O, block on a monitor, or return instantly from a cache.
pub trait Topology: Send + Sync {
    /// Attempts to select one server matching `selector`. Returns `Ok(None)` only in the
    /// degenerate case where the implementation cannot produce either a server or an error
    /// (callers should treat this the same as a missing selection error).
    fn select_server(
        &self,
        selector: &SelectionCriteria,
    ) -> impl Future<Output = Result<Option<Server>>> + Send;

    /// Whether the topology's session support has not yet been determined and a discovery
    /// selection is required before anything else can proceed.
    fn should_check_for_session_support(&self) -> bool;

    /// Whether the topology (once discovery has settled) supports sessions at all.
    fn has_session_support(&self) -> bool;

    /// Whether the topology can serve snapshot reads.
    fn supports_snapshot_reads(&self) -> bool;

    /// The lowest max wire version among all servers the topology currently knows about.
    fn common_wire_version(&self) -> i32;

    /// Mints a new implicit session tagged with `owner`.
    fn start_session(&self, owner: SessionOwner) -> impl Future<Output = Session> + Send;

    /// Ends a session, returning it (and its server-side resources) to the session pool. Any
    /// error here is surfaced by the coordinator only when the operation itself succeeded.
    fn end_session(&self, session: &mut Session) -> impl Future<Output = Result<()>> + Send;

    /// Forcibly clears the connection pool for `address` after an unpin caused by a
    /// cursor-creating operation network-erroring while its session was pinned, so a retry does
    /// not reuse a connection the server may have already torn down.
    fn clear_pool_for_pinned_server(
        &self,
        address: &ServerAddress,
    ) -> impl Future<Output = ()> + Send;
}
