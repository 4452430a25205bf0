//! An in-memory, scriptable [`Topology`] double for exercising the coordinator, retry, and
//! session-binding logic without a live cluster.

use std::sync::Mutex;

use crate::{
    aspect::Aspects,
    error::{Error, ErrorKind, Result},
    operation::{Operation, OperationOptions},
    selection_criteria::SelectionCriteria,
    server::{Server, ServerAddress, ServerDescription, ServerType},
    session::{Session, SessionOwner},
    topology::Topology,
};

/// One scripted response to a `select_server` call.
#[derive(Clone, Debug)]
pub enum ScriptedSelection {
    /// Selection succeeds and returns this server.
    Server(ServerDescription),
    /// Selection fails with this error.
    Error(Error),
    /// Selection succeeds but yields no server (the degenerate case callers must still handle).
    None,
}

/// A scriptable [`Topology`] double.
///
/// Construct with [`ScriptedTopology::new`], queue up server-selection responses with
/// [`ScriptedTopology::push_selection`], and configure session/retry capability flags with the
/// builder-style `with_*` methods. Each call to `select_server` pops the next queued response,
/// repeating the last one once the queue is drained (so tests that don't care about a third
/// selection don't have to script one).
pub struct ScriptedTopology {
    selections: Mutex<Vec<ScriptedSelection>>,
    session_support: bool,
    check_for_session_support: bool,
    snapshot_reads: bool,
    common_wire_version: i32,
    ended_sessions: Mutex<Vec<SessionOwner>>,
    cleared_pools: Mutex<Vec<ServerAddress>>,
}

impl ScriptedTopology {
    /// Creates a new double with no scripted selections and every capability flag off.
    pub fn new() -> Self {
        Self {
            selections: Mutex::new(Vec::new()),
            session_support: true,
            check_for_session_support: false,
            snapshot_reads: false,
            common_wire_version: crate::topology::SUPPORTS_OP_MSG,
            ended_sessions: Mutex::new(Vec::new()),
            cleared_pools: Mutex::new(Vec::new()),
        }
    }

    /// Queues the next response to `select_server`, in call order.
    pub fn push_selection(&mut self, selection: ScriptedSelection) -> &mut Self {
        self.selections.get_mut().unwrap().push(selection);
        self
    }

    /// Sets whether the topology reports session support.
    pub fn with_session_support(mut self, supported: bool) -> Self {
        self.session_support = supported;
        self
    }

    /// Sets whether the topology reports that session support is still undetermined.
    pub fn with_check_for_session_support(mut self, needed: bool) -> Self {
        self.check_for_session_support = needed;
        self
    }

    /// Sets whether the topology can serve snapshot reads.
    pub fn with_snapshot_reads(mut self, supported: bool) -> Self {
        self.snapshot_reads = supported;
        self
    }

    /// Sets the topology's common (lowest) max wire version.
    pub fn with_common_wire_version(mut self, version: i32) -> Self {
        self.common_wire_version = version;
        self
    }

    /// The owners of every session ended through this double, in call order.
    pub fn ended_session_owners(&self) -> Vec<SessionOwner> {
        self.ended_sessions.lock().unwrap().clone()
    }

    /// The addresses pool-cleared through this double, in call order.
    pub fn cleared_pool_addresses(&self) -> Vec<ServerAddress> {
        self.cleared_pools.lock().unwrap().clone()
    }
}

impl Default for ScriptedTopology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology for ScriptedTopology {
    async fn select_server(&self, _selector: &SelectionCriteria) -> Result<Option<Server>> {
        let mut selections = self.selections.lock().unwrap();
        let next = if selections.len() > 1 {
            selections.remove(0)
        } else {
            selections
                .first()
                .cloned()
                .unwrap_or(ScriptedSelection::None)
        };

        match next {
            ScriptedSelection::Server(description) => Ok(Some(Server::new(description))),
            ScriptedSelection::Error(error) => Err(error),
            ScriptedSelection::None => Ok(None),
        }
    }

    fn should_check_for_session_support(&self) -> bool {
        self.check_for_session_support
    }

    fn has_session_support(&self) -> bool {
        self.session_support
    }

    fn supports_snapshot_reads(&self) -> bool {
        self.snapshot_reads
    }

    fn common_wire_version(&self) -> i32 {
        self.common_wire_version
    }

    async fn start_session(&self, owner: SessionOwner) -> Session {
        Session::new_implicit(owner)
    }

    async fn end_session(&self, session: &mut Session) -> Result<()> {
        if let Some(owner) = session.owner() {
            self.ended_sessions.lock().unwrap().push(owner);
        }
        session.mark_ended();
        Ok(())
    }

    async fn clear_pool_for_pinned_server(&self, address: &ServerAddress) {
        self.cleared_pools.lock().unwrap().push(address.clone());
    }
}

/// Builds an unremarkable, writable primary description at the given wire version, supporting
/// retryable writes.
pub fn primary_description(address: &str, max_wire_version: i32) -> ServerDescription {
    ServerDescription {
        address: ServerAddress::new(address),
        server_type: ServerType::Primary,
        max_wire_version: Some(max_wire_version),
        supports_retryable_writes: true,
    }
}

/// Builds a network-error `Error`.
pub fn network_error(message: &str) -> Error {
    Error::new(ErrorKind::Network {
        message: message.to_string(),
    })
}

/// One scripted response to a `ScriptedOperation::execute` call.
#[derive(Clone, Debug)]
pub enum ScriptedAttempt {
    /// The attempt succeeds, yielding this value.
    Ok(String),
    /// The attempt fails with this error.
    Err(Error),
}

/// A scriptable [`Operation`] double.
///
/// Each call to `execute` pops the next queued [`ScriptedAttempt`] and records the address of
/// the server it ran against, so tests can assert both the caller-visible outcome and which
/// servers were actually contacted.
pub struct ScriptedOperation {
    name: String,
    aspects: Aspects,
    selection_criteria: Option<SelectionCriteria>,
    pinned_server: Option<ServerAddress>,
    can_retry_read: bool,
    can_retry_write: bool,
    try_secondary_write: bool,
    validation_error: Option<Error>,
    options: OperationOptions,
    attempts: Mutex<Vec<ScriptedAttempt>>,
    contacted: Mutex<Vec<ServerAddress>>,
}

impl ScriptedOperation {
    /// Creates a new scripted operation with the given name and aspects. Attempts and read
    /// preference are configured with the builder-style `with_*` methods below.
    pub fn new(name: &str, aspects: Aspects) -> Self {
        Self {
            name: name.to_string(),
            aspects,
            selection_criteria: None,
            pinned_server: None,
            can_retry_read: true,
            can_retry_write: true,
            try_secondary_write: false,
            validation_error: None,
            options: OperationOptions::default(),
            attempts: Mutex::new(Vec::new()),
            contacted: Mutex::new(Vec::new()),
        }
    }

    /// Queues the next attempt's outcome, in call order.
    pub fn push_attempt(mut self, attempt: ScriptedAttempt) -> Self {
        self.attempts.get_mut().unwrap().push(attempt);
        self
    }

    /// Sets the selection criteria this operation reports.
    pub fn with_selection_criteria(mut self, criteria: SelectionCriteria) -> Self {
        self.selection_criteria = Some(criteria);
        self
    }

    /// Sets the server this operation is pinned to (for `CURSOR_ITERATING` operations).
    pub fn with_pinned_server(mut self, address: ServerAddress) -> Self {
        self.pinned_server = Some(address);
        self
    }

    /// Sets whether this operation's author allows it to be retried as a read.
    pub fn with_can_retry_read(mut self, value: bool) -> Self {
        self.can_retry_read = value;
        self
    }

    /// Sets whether this operation's author allows it to be retried as a write.
    pub fn with_can_retry_write(mut self, value: bool) -> Self {
        self.can_retry_write = value;
        self
    }

    /// Sets whether this operation may be routed to a writable secondary-eligible server.
    pub fn with_try_secondary_write(mut self, value: bool) -> Self {
        self.try_secondary_write = value;
        self
    }

    /// Makes this operation fail pre-flight validation with `error`, before any server is
    /// selected or session is touched.
    pub fn with_validation_error(mut self, error: Error) -> Self {
        self.validation_error = Some(error);
        self
    }

    /// The addresses of every server this operation actually ran against, in call order.
    pub fn contacted_servers(&self) -> Vec<ServerAddress> {
        self.contacted.lock().unwrap().clone()
    }

    /// How many times `execute` was called.
    pub fn attempt_count(&self) -> usize {
        self.contacted.lock().unwrap().len()
    }
}

impl Operation for ScriptedOperation {
    type Output = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        match &self.validation_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn aspects(&self) -> Aspects {
        self.aspects
    }

    fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.selection_criteria.as_ref()
    }

    fn pinned_server(&self) -> Option<&ServerAddress> {
        self.pinned_server.as_ref()
    }

    fn can_retry_read(&self) -> bool {
        self.can_retry_read
    }

    fn can_retry_write(&self) -> bool {
        self.can_retry_write
    }

    fn try_secondary_write(&self) -> bool {
        self.try_secondary_write
    }

    fn options_mut(&mut self) -> &mut OperationOptions {
        &mut self.options
    }

    async fn execute(&self, server: &Server, _session: Option<&mut Session>) -> Result<Self::Output> {
        self.contacted
            .lock()
            .unwrap()
            .push(server.description.address.clone());

        let mut attempts = self.attempts.lock().unwrap();
        let next = if attempts.len() > 1 {
            attempts.remove(0)
        } else {
            attempts
                .first()
                .cloned()
                .unwrap_or(ScriptedAttempt::Err(Error::new(ErrorKind::Runtime {
                    message: "no more scripted attempts queued".to_string(),
                })))
        };

        match next {
            ScriptedAttempt::Ok(value) => Ok(value),
            ScriptedAttempt::Err(error) => Err(error),
        }
    }
}
