//! Contains the `Error` and `Result` types used throughout the execution core.

use std::collections::HashSet;

use thiserror::Error;

/// Retryable write error label. Added to an error when the error is write-retryable.
pub const RETRYABLE_WRITE_ERROR: &str = "RetryableWriteError";
/// Transient transaction error label. Added to a network error or server selection error that
/// occurs during a transaction.
pub const TRANSIENT_TRANSACTION_ERROR: &str = "TransientTransactionError";
/// Unknown transaction commit result error label.
pub const UNKNOWN_TRANSACTION_COMMIT_RESULT: &str = "UnknownTransactionCommitResult";

/// The result type for all methods that can return an error in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while selecting a server, binding a session, or executing an
/// operation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}")]
pub struct Error {
    kind: Box<ErrorKind>,
    labels: HashSet<String>,
    /// The max wire version of the server observed immediately before this error, if any.
    /// Snapshotted by the coordinator before the server description can be invalidated by the
    /// very error being recorded.
    pub(crate) wire_version: Option<i32>,
}

impl Error {
    /// Creates a new error of the given kind with no labels.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            labels: HashSet::new(),
            wire_version: None,
        }
    }

    /// The kind of error that occurred.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the labels attached to this error.
    pub fn labels(&self) -> &HashSet<String> {
        &self.labels
    }

    /// Whether this error carries the given label.
    pub fn contains_label<T: AsRef<str>>(&self, label: T) -> bool {
        self.labels.contains(label.as_ref())
    }

    /// Adds a label to this error.
    pub fn add_label<T: AsRef<str>>(&mut self, label: T) {
        self.labels.insert(label.as_ref().to_string());
    }

    /// The numeric server code carried by this error, if it originated from the server.
    pub fn server_code(&self) -> Option<i32> {
        match &*self.kind {
            ErrorKind::ServerError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this is a network-layer error (the operation may not have reached the server).
    pub fn is_network_error(&self) -> bool {
        matches!(&*self.kind, ErrorKind::Network { .. })
    }

    /// Whether this is a server-selection error.
    pub fn is_server_selection_error(&self) -> bool {
        matches!(&*self.kind, ErrorKind::ServerSelection { .. })
    }

    /// Whether this error indicates the server is stepping down or recovering
    /// (a "not writable primary" or "node is recovering" style response).
    pub fn is_state_change_error(&self) -> bool {
        match self.server_code() {
            Some(code) => STATE_CHANGE_CODES.contains(&code),
            None => false,
        }
    }
}

/// The legacy MongoDB `IllegalOperation` code returned by deployments that reject transaction
/// numbers outright (e.g. MMAPv1 storage engine replica sets).
pub(crate) const ILLEGAL_OPERATION_CODE: i32 = 20;

/// Server codes indicating the node is stepping down, recovering, or otherwise not currently
/// writable, used to classify reads as retryable on pre-label (< wire version 6) servers.
const STATE_CHANGE_CODES: [i32; 8] = [11600, 11602, 13436, 189, 91, 10107, 13435, 10058];

/// Server codes indicating a write was safe to retry on a server that predates the
/// `RetryableWriteError` label (wire version < 6).
pub(crate) const LEGACY_RETRYABLE_WRITE_CODES: [i32; 12] =
    [11600, 11602, 10107, 13435, 13436, 189, 91, 7, 6, 89, 9001, 262];

/// The canonical message surfaced when a pre-4.0 storage engine rejects retryable writes
/// outright.
pub const LEGACY_RETRYABLE_WRITES_REMAP_MESSAGE: &str =
    "This MongoDB deployment does not support retryable writes. Please add retryWrites=false to \
     your connection string.";

/// The kind of error that occurred.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The operation was not a well-formed instance (e.g. it requested an unsupported
    /// combination of aspects).
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation failed validation.
        message: String,
    },

    /// An explicit session was used after it had already ended.
    #[error("the session has already ended and cannot be used")]
    ExpiredSession,

    /// The caller's request is not compatible with the topology (e.g. a session was supplied to
    /// a deployment without session support, or snapshot reads were requested from a topology
    /// that cannot serve them).
    #[error("{message}")]
    Compatibility {
        /// Description of the incompatibility.
        message: String,
    },

    /// An operation was attempted in a transaction in a way the transaction does not allow
    /// (e.g. a non-primary read preference).
    #[error("{message}")]
    Transaction {
        /// Description of the transaction-state violation.
        message: String,
    },

    /// A network-layer failure (the operation may or may not have reached the server).
    #[error("network error: {message}")]
    Network {
        /// Description of the network failure.
        message: String,
    },

    /// The topology could not select a suitable server for the operation.
    #[error("server selection failed: {message}")]
    ServerSelection {
        /// Description of why no server could be selected.
        message: String,
    },

    /// The server rejected the operation with a command error.
    #[error("command failed with code {code}: {message}")]
    ServerError {
        /// The numeric error code returned by the server.
        code: i32,
        /// The error message returned by the server.
        message: String,
    },

    /// The server (or topology) responded in a way the core did not expect, e.g. a re-selected
    /// server that does not support the retry that is about to be attempted.
    #[error("unexpected server response: {message}")]
    UnexpectedServerResponse {
        /// Description of the unexpected response.
        message: String,
    },

    /// A failure internal to the core's own bookkeeping, not attributable to the network or
    /// server (a programmer error in a collaborator, for example).
    #[error("internal error: {message}")]
    Runtime {
        /// Description of the internal failure.
        message: String,
    },
}
