//! Client session state: transaction numbers, transaction pinning, and implicit-session
//! ownership tracking.

use uuid::Uuid;

use crate::server::ServerAddress;

/// A process-unique tag attached to an implicit session so the coordinator can tell whether the
/// session it is about to end back into the pool is still the same one it started, rather than
/// one some other task already recycled. It is not an identity: two sessions can share an owner
/// only if one task starts several implicit sessions in sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOwner(Uuid);

impl SessionOwner {
    /// Mints a new, process-unique owner tag.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionOwner {
    fn default() -> Self {
        Self::new()
    }
}

/// The lifecycle state of a session's current multi-statement transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// No transaction is in progress.
    #[default]
    None,
    /// `start_transaction` has been called but no operation has run yet.
    Starting,
    /// At least one operation has run within the transaction.
    InProgress,
    /// The transaction has committed.
    Committed,
    /// The transaction has aborted.
    Aborted,
}

/// State describing a session's current (or most recent) transaction.
#[derive(Clone, Debug, Default)]
pub struct Transaction {
    state: TransactionState,
    pinned: Option<ServerAddress>,
}

impl Transaction {
    /// Whether a transaction is currently starting or in progress.
    pub fn in_transaction(&self) -> bool {
        matches!(
            self.state,
            TransactionState::Starting | TransactionState::InProgress
        )
    }

    /// Whether the most recent transaction committed.
    pub fn is_committed(&self) -> bool {
        matches!(self.state, TransactionState::Committed)
    }

    /// The server or mongos this session's transaction is pinned to, if any.
    pub fn pinned_server(&self) -> Option<&ServerAddress> {
        self.pinned.as_ref()
    }
}

/// Client session state attached to an operation.
///
/// A `Session` may be explicit (created and held by the caller across many operations) or
/// implicit (minted by the coordinator for the duration of a single operation and ended
/// immediately afterward).
#[derive(Clone, Debug)]
pub struct Session {
    id: Uuid,
    owner: Option<SessionOwner>,
    ended: bool,
    snapshot_enabled: bool,
    txn_number: i64,
    transaction: Transaction,
}

impl Session {
    /// Creates a new explicit session.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: None,
            ended: false,
            snapshot_enabled: false,
            txn_number: 0,
            transaction: Transaction::default(),
        }
    }

    /// Creates a new implicit session tagged with `owner`.
    pub fn new_implicit(owner: SessionOwner) -> Self {
        Self {
            owner: Some(owner),
            ..Self::new()
        }
    }

    /// This session's server-side id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether this session was minted implicitly for a single operation rather than created
    /// explicitly by the caller.
    pub fn is_implicit(&self) -> bool {
        self.owner.is_some()
    }

    /// The owner tag, if this session is implicit.
    pub fn owner(&self) -> Option<SessionOwner> {
        self.owner
    }

    /// Whether this session has already been returned to the session pool.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Marks this session as ended. Idempotent.
    pub fn mark_ended(&mut self) {
        self.ended = true;
    }

    /// Whether this session has snapshot reads enabled.
    pub fn snapshot_enabled(&self) -> bool {
        self.snapshot_enabled
    }

    /// Enables snapshot reads for this session.
    pub fn enable_snapshot(&mut self) {
        self.snapshot_enabled = true;
    }

    /// The current transaction number.
    pub fn txn_number(&self) -> i64 {
        self.txn_number
    }

    /// Read-only view of the session's current transaction state.
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Advances and returns the transaction number, for use by retryable writes and transactions
    /// alike: each retryable write gets its own fresh number, and a transaction's operations all
    /// share the number assigned when it started.
    pub fn get_and_advance_txn_number(&mut self) -> i64 {
        self.txn_number += 1;
        self.txn_number
    }

    /// Begins a new transaction, pinned to no server yet.
    pub fn start_transaction(&mut self) {
        self.transaction = Transaction {
            state: TransactionState::Starting,
            pinned: None,
        };
        self.txn_number += 1;
    }

    /// Marks the in-progress transaction as having executed at least one operation.
    pub fn advance_transaction(&mut self) {
        if self.transaction.state == TransactionState::Starting {
            self.transaction.state = TransactionState::InProgress;
        }
    }

    /// Pins the current transaction to `address`, e.g. because the selected server is a mongos
    /// and subsequent statements in the same transaction must reuse it.
    pub fn pin(&mut self, address: ServerAddress) {
        self.transaction.pinned = Some(address);
    }

    /// Clears the transaction's pinned server, e.g. lazily after observing that the transaction
    /// already committed, or forcibly after a cursor-creating network error.
    pub fn unpin(&mut self) {
        self.transaction.pinned = None;
    }

    /// Records that the in-progress transaction has committed. Does not unpin: a committed
    /// transaction's pin is cleared lazily, the next time it is observed still pinned.
    pub fn commit_transaction(&mut self) {
        self.transaction.state = TransactionState::Committed;
    }

    /// Records that the in-progress transaction has aborted and clears its pin.
    pub fn abort_transaction(&mut self) {
        self.transaction.state = TransactionState::Aborted;
        self.transaction.pinned = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
