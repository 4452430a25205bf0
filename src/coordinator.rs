//! Execution Coordinator: the crate's single externally-visible entry point.

use crate::{
    aspect::{Aspects, Retryability},
    error::{Error, ErrorKind, Result},
    log::trace_event,
    operation::Operation,
    options::ExecutionOptions,
    retry,
    selection_criteria::{ReadPreference, SelectionCriteria},
    selector,
    session::{Session, SessionOwner},
    topology::Topology,
};

/// Orchestrates one operation's execution: validates the request, acquires a session, selects a
/// server, runs the operation, retries once if warranted, and tears down any session it created.
#[derive(Clone, Copy, Debug, Default)]
pub struct Coordinator;

impl Coordinator {
    /// Creates a coordinator. Stateless: a single instance may drive any number of concurrent
    /// `execute` calls, each as its own suspended task.
    pub fn new() -> Self {
        Self
    }

    /// Runs `operation` to completion, including its single retry if one is warranted.
    ///
    /// `session` is the caller's explicit session, if any. When it is `None` and the topology
    /// supports sessions, the coordinator mints and tears down an implicit one for the duration
    /// of this call. `options` is the caller-assembled retry/session configuration consulted for
    /// every call; unlike `topology` and `session` it carries no collaborator state of its own.
    #[cfg_attr(
        feature = "tracing-unstable",
        tracing::instrument(
            level = "debug",
            skip_all,
            fields(operation = operation.name(), aspects = ?operation.aspects())
        )
    )]
    pub async fn execute<Top, Op>(
        &self,
        topology: &Top,
        operation: &mut Op,
        session: Option<&mut Session>,
        options: &ExecutionOptions,
    ) -> Result<Op::Output>
    where
        Top: Topology,
        Op: Operation,
    {
        loop {
            operation.validate()?;

            if topology.should_check_for_session_support() {
                trace_event!(message = "forcing discovery via primary-preferred pre-selection");
                topology
                    .select_server(&SelectionCriteria::ReadPreference(
                        ReadPreference::PrimaryPreferred,
                    ))
                    .await?;
                continue;
            }

            break;
        }

        match session {
            Some(explicit) => {
                if explicit.is_ended() {
                    return Err(Error::new(ErrorKind::ExpiredSession));
                }
                if !topology.has_session_support() {
                    return Err(Error::new(ErrorKind::Compatibility {
                        message: "a session was provided but the topology does not support sessions"
                            .to_string(),
                    }));
                }
                if explicit.snapshot_enabled() && !topology.supports_snapshot_reads() {
                    return Err(Error::new(ErrorKind::Compatibility {
                        message: "snapshot reads were requested but the topology cannot serve them"
                            .to_string(),
                    }));
                }

                self.execute_with_selection(topology, operation, Some(explicit), options)
                    .await
            }
            None => {
                if !topology.has_session_support() {
                    return self
                        .execute_with_selection(topology, operation, None, options)
                        .await;
                }

                let owner = SessionOwner::new();
                let mut implicit = topology.start_session(owner).await;

                let result = self
                    .execute_with_selection(topology, operation, Some(&mut implicit), options)
                    .await;

                trace_event!(message = "ending implicit session", owner = ?owner);
                let end_result = topology.end_session(&mut implicit).await;

                match result {
                    Ok(output) => end_result.map(|_| output),
                    Err(execution_error) => Err(execution_error),
                }
            }
        }
    }

    async fn execute_with_selection<Top, Op>(
        &self,
        topology: &Top,
        operation: &mut Op,
        mut session: Option<&mut Session>,
        options: &ExecutionOptions,
    ) -> Result<Op::Output>
    where
        Top: Topology,
        Op: Operation,
    {
        selector::preflight(operation, session.as_deref_mut())?;

        let selector_criteria = selector::resolve_selector(operation, topology.common_wire_version());

        let server = match topology.select_server(&selector_criteria).await? {
            Some(server) => server,
            None => {
                return Err(Error::new(ErrorKind::UnexpectedServerResponse {
                    message: "server selection failed without error".to_string(),
                }))
            }
        };

        let aspects = operation.aspects();
        let retryability = if !aspects.contains(Aspects::RETRYABLE) || session.is_none() {
            Retryability::None
        } else {
            let in_transaction = session
                .as_deref()
                .map(|s| s.transaction().in_transaction())
                .unwrap_or(false);

            if aspects.contains(Aspects::WRITE)
                && options.retry_writes_enabled()
                && !in_transaction
                && server.description.supports_retryable_writes
                && operation.can_retry_write()
            {
                Retryability::Write
            } else if aspects.contains(Aspects::READ)
                && options.retry_reads_enabled()
                && !in_transaction
                && server.description.max_wire_version.unwrap_or(0) >= crate::topology::SUPPORTS_OP_MSG
                && operation.can_retry_read()
            {
                Retryability::Read
            } else {
                Retryability::None
            }
        };

        let snapshotted_wire_version = server.description.max_wire_version.unwrap_or(0);

        if retryability == Retryability::Write {
            operation.options_mut().set_will_retry_write(true);
            if let Some(session) = session.as_deref_mut() {
                session.get_and_advance_txn_number();
            }
        }

        trace_event!(message = "first attempt", operation = operation.name());
        let first_result = operation.execute(&server, session.as_deref_mut()).await;

        let error = match first_result {
            Ok(output) => return Ok(output),
            Err(error) => error,
        };

        if retryability == Retryability::None {
            return Err(error);
        }

        trace_event!(message = "first attempt failed, consulting retry policy", operation = operation.name());
        let is_cursor_creating = aspects.contains(Aspects::CURSOR_CREATING);
        let second_server = retry::plan_retry(
            topology,
            retryability,
            &selector_criteria,
            session.as_deref_mut(),
            is_cursor_creating,
            error,
            snapshotted_wire_version,
        )
        .await?;

        trace_event!(message = "second attempt", operation = operation.name());
        operation.execute(&second_server, session.as_deref_mut()).await
    }
}
