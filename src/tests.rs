//! End-to-end coordinator tests driven against the in-memory [`crate::testing`] doubles.
//!
//! Each test below corresponds to one of the execution scenarios exercised by the reference
//! driver's retryable-reads/retryable-writes/sessions spec suites, reduced to the narrow
//! contract this crate owns.

use pretty_assertions::assert_eq;

use crate::{
    aspect::Aspects,
    coordinator::Coordinator,
    error::ErrorKind,
    options::ExecutionOptions,
    selection_criteria::{ReadPreference, SelectionCriteria},
    server::ServerAddress,
    session::Session,
    testing::{network_error, primary_description, ScriptedAttempt, ScriptedOperation, ScriptedSelection, ScriptedTopology},
    topology::SUPPORTS_OP_MSG,
};

fn secondary_description(address: &str, max_wire_version: i32) -> crate::server::ServerDescription {
    crate::server::ServerDescription {
        address: ServerAddress::new(address),
        server_type: crate::server::ServerType::Secondary,
        max_wire_version: Some(max_wire_version),
        supports_retryable_writes: false,
    }
}

// Scenario 1: retryable write, network error on first attempt, success on second.
#[tokio::test]
async fn retryable_write_retries_once_after_network_error() {
    let options = ExecutionOptions::builder().retry_writes(true).build();
    let mut topology = ScriptedTopology::new();
    topology
        .push_selection(ScriptedSelection::Server(primary_description(
            "primary-1",
            SUPPORTS_OP_MSG,
        )))
        .push_selection(ScriptedSelection::Server(primary_description(
            "primary-2",
            SUPPORTS_OP_MSG,
        )));

    let mut operation = ScriptedOperation::new("insert", Aspects::WRITE | Aspects::RETRYABLE)
        .push_attempt(ScriptedAttempt::Err(network_error("ECONNRESET")))
        .push_attempt(ScriptedAttempt::Ok("{ok:1, n:1}".to_string()));

    let mut session = Session::new();
    let coordinator = Coordinator::new();

    let result = coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect("second attempt should succeed");

    assert_eq!(result, "{ok:1, n:1}");
    assert_eq!(session.txn_number(), 1);
    assert_eq!(operation.attempt_count(), 2);
    assert_eq!(
        operation.contacted_servers(),
        vec![ServerAddress::new("primary-1"), ServerAddress::new("primary-2")]
    );
}

// Scenario 2: retryable write, legacy MMAPv1 refusal remaps and does not retry.
#[tokio::test]
async fn legacy_illegal_operation_remaps_without_a_second_attempt() {
    let options = ExecutionOptions::builder().retry_writes(true).build();
    let mut topology = ScriptedTopology::new();
    topology.push_selection(ScriptedSelection::Server(primary_description(
        "primary-1",
        SUPPORTS_OP_MSG,
    )));

    let mut operation = ScriptedOperation::new("insert", Aspects::WRITE | Aspects::RETRYABLE).push_attempt(
        ScriptedAttempt::Err(crate::error::Error::new(ErrorKind::ServerError {
            code: 20,
            message: "Transaction numbers are only allowed on a replica set member or mongos"
                .to_string(),
        })),
    );

    let mut session = Session::new();
    let coordinator = Coordinator::new();

    let error = coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect_err("legacy refusal should surface as an error");

    match error.kind() {
        ErrorKind::ServerError { code, message } => {
            assert_eq!(*code, 20);
            assert_eq!(message, crate::error::LEGACY_RETRYABLE_WRITES_REMAP_MESSAGE);
        }
        other => panic!("expected a remapped ServerError, got {other:?}"),
    }
    assert_eq!(operation.attempt_count(), 1, "no second attempt is performed");
    assert_eq!(session.txn_number(), 1, "txn number still advances once for the armed attempt");
}

// Scenario 3: retryWrites=false, network error surfaces unchanged, no retry.
#[tokio::test]
async fn non_retryable_write_surfaces_network_error_unchanged() {
    let options = ExecutionOptions::builder().retry_writes(false).build();
    let mut topology = ScriptedTopology::new();
    topology.push_selection(ScriptedSelection::Server(primary_description(
        "primary-1",
        SUPPORTS_OP_MSG,
    )));

    let mut operation = ScriptedOperation::new("insert", Aspects::WRITE | Aspects::RETRYABLE)
        .push_attempt(ScriptedAttempt::Err(network_error("ECONNRESET")));

    let mut session = Session::new();
    let coordinator = Coordinator::new();

    let error = coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect_err("network error should surface");

    assert!(error.is_network_error());
    assert_eq!(operation.attempt_count(), 1);
    assert_eq!(session.txn_number(), 0, "txn number is untouched when no retry is armed");
}

// Scenario 4: retryable read, NotWritablePrimary on first attempt, success on a new secondary.
#[tokio::test]
async fn retryable_read_retries_once_after_state_change_error() {
    let options = ExecutionOptions::default();
    let mut topology = ScriptedTopology::new();
    topology
        .push_selection(ScriptedSelection::Server(primary_description(
            "primary-1",
            SUPPORTS_OP_MSG,
        )))
        .push_selection(ScriptedSelection::Server(secondary_description(
            "secondary-1",
            SUPPORTS_OP_MSG,
        )));

    let mut operation = ScriptedOperation::new("find", Aspects::READ | Aspects::RETRYABLE)
        .push_attempt(ScriptedAttempt::Err(crate::error::Error::new(
            ErrorKind::ServerError {
                code: 10107,
                message: "not master".to_string(),
            },
        )))
        .push_attempt(ScriptedAttempt::Ok("{docs: []}".to_string()));

    let mut session = Session::new();
    let coordinator = Coordinator::new();

    let result = coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect("second attempt should succeed");

    assert_eq!(result, "{docs: []}");
    assert_eq!(session.txn_number(), 0, "reads never advance the txn number");
}

// Scenario 5: transaction with a non-primary read preference fails pre-flight, no server contacted.
#[tokio::test]
async fn transaction_with_non_primary_read_preference_fails_preflight() {
    let options = ExecutionOptions::default();
    let topology = ScriptedTopology::new();

    let mut operation = ScriptedOperation::new("find", Aspects::READ)
        .with_selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Secondary));

    let mut session = Session::new();
    session.start_transaction();

    let coordinator = Coordinator::new();
    let error = coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect_err("non-primary reads in a transaction must fail pre-flight");

    assert!(matches!(error.kind(), ErrorKind::Transaction { .. }));
    assert_eq!(operation.attempt_count(), 0, "no server should be contacted");
}

// Scenario 6: cursor-creating op network-errors while pinned; forced unpin, pool cleared, retried.
#[tokio::test]
async fn cursor_creating_network_error_forces_unpin_and_retries() {
    let options = ExecutionOptions::default();
    let mut topology = ScriptedTopology::new();
    topology
        .push_selection(ScriptedSelection::Server(primary_description(
            "primary-1",
            SUPPORTS_OP_MSG,
        )))
        .push_selection(ScriptedSelection::Server(primary_description(
            "primary-2",
            SUPPORTS_OP_MSG,
        )));

    let mut operation = ScriptedOperation::new(
        "aggregate",
        Aspects::READ | Aspects::RETRYABLE | Aspects::CURSOR_CREATING,
    )
    .push_attempt(ScriptedAttempt::Err(network_error("ECONNRESET")))
    .push_attempt(ScriptedAttempt::Ok("{cursor: {id: 1}}".to_string()));

    let mut session = Session::new();
    session.pin(ServerAddress::new("primary-1"));

    let coordinator = Coordinator::new();
    let result = coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect("cursor should open on the retried attempt");

    assert_eq!(result, "{cursor: {id: 1}}");
    assert_eq!(session.transaction().pinned_server(), None, "session is force-unpinned");
}

// Invariant 4/5: an implicit session is created and ended exactly once; an explicit session's
// `ended` flag is never touched by the core.
#[tokio::test]
async fn implicit_session_is_created_and_ended_exactly_once() {
    let options = ExecutionOptions::default();
    let mut topology = ScriptedTopology::new();
    topology.push_selection(ScriptedSelection::Server(primary_description(
        "primary-1",
        SUPPORTS_OP_MSG,
    )));

    let mut operation =
        ScriptedOperation::new("find", Aspects::READ).push_attempt(ScriptedAttempt::Ok("{}".to_string()));

    let coordinator = Coordinator::new();
    let result = coordinator
        .execute(&topology, &mut operation, None, &options)
        .await;

    assert!(result.is_ok());
    assert_eq!(topology.ended_session_owners().len(), 1);
}

#[tokio::test]
async fn explicit_session_is_never_ended_by_the_core() {
    let options = ExecutionOptions::default();
    let mut topology = ScriptedTopology::new();
    topology.push_selection(ScriptedSelection::Server(primary_description(
        "primary-1",
        SUPPORTS_OP_MSG,
    )));

    let mut operation =
        ScriptedOperation::new("find", Aspects::READ).push_attempt(ScriptedAttempt::Ok("{}".to_string()));

    let mut session = Session::new();
    let coordinator = Coordinator::new();
    coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect("execution should succeed");

    assert!(!session.is_ended());
    assert!(topology.ended_session_owners().is_empty());
}

// A non-retryable first-attempt failure surfaces even though the implicit session still has to
// be torn down on the way out.
#[tokio::test]
async fn execution_error_surfaces_despite_implicit_session_teardown() {
    let options = ExecutionOptions::default();
    let mut topology = ScriptedTopology::new();
    topology.push_selection(ScriptedSelection::Server(primary_description(
        "primary-1",
        SUPPORTS_OP_MSG,
    )));

    let mut operation = ScriptedOperation::new("find", Aspects::READ).push_attempt(ScriptedAttempt::Err(
        crate::error::Error::new(ErrorKind::Runtime {
            message: "boom".to_string(),
        }),
    ));

    let coordinator = Coordinator::new();
    let error = coordinator
        .execute(&topology, &mut operation, None, &options)
        .await
        .expect_err("execution should fail");

    assert!(matches!(error.kind(), ErrorKind::Runtime { .. }));
}

// Coordinator step 1: a malformed operation fails fast, before any session is touched or server
// contacted.
#[tokio::test]
async fn malformed_operation_fails_validation_before_any_attempt() {
    let options = ExecutionOptions::default();
    let topology = ScriptedTopology::new();
    let mut operation = ScriptedOperation::new("find", Aspects::READ).with_validation_error(
        crate::error::Error::new(ErrorKind::InvalidOperation {
            message: "READ and WRITE aspects are mutually exclusive".to_string(),
        }),
    );

    let coordinator = Coordinator::new();
    let error = coordinator
        .execute(&topology, &mut operation, None, &options)
        .await
        .expect_err("validation failure must be surfaced");

    assert!(matches!(error.kind(), ErrorKind::InvalidOperation { .. }));
    assert_eq!(operation.attempt_count(), 0);
    assert!(topology.ended_session_owners().is_empty());
}

// Compatibility checks from Coordinator step 2.
#[tokio::test]
async fn expired_explicit_session_is_rejected() {
    let options = ExecutionOptions::default();
    let topology = ScriptedTopology::new();
    let mut operation = ScriptedOperation::new("find", Aspects::READ);
    let mut session = Session::new();
    session.mark_ended();

    let coordinator = Coordinator::new();
    let error = coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect_err("an ended session must be rejected");

    assert!(matches!(error.kind(), ErrorKind::ExpiredSession));
    assert_eq!(operation.attempt_count(), 0);
}

#[tokio::test]
async fn session_on_a_topology_without_session_support_is_a_compatibility_error() {
    let options = ExecutionOptions::default();
    let topology = ScriptedTopology::new().with_session_support(false);
    let mut operation = ScriptedOperation::new("find", Aspects::READ);
    let mut session = Session::new();

    let coordinator = Coordinator::new();
    let error = coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect_err("a session on an unsupporting topology must be rejected");

    assert!(matches!(error.kind(), ErrorKind::Compatibility { .. }));
}

#[tokio::test]
async fn snapshot_reads_on_an_unsupporting_topology_are_a_compatibility_error() {
    let options = ExecutionOptions::default();
    let topology = ScriptedTopology::new().with_snapshot_reads(false);
    let mut operation = ScriptedOperation::new("find", Aspects::READ);
    let mut session = Session::new();
    session.enable_snapshot();

    let coordinator = Coordinator::new();
    let error = coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect_err("snapshot reads must be rejected when unsupported");

    assert!(matches!(error.kind(), ErrorKind::Compatibility { .. }));
}

// Retry policy: a re-selected server that lacks the required capability surfaces
// `UnexpectedServerResponse` rather than attempting a doomed second attempt.
#[tokio::test]
async fn retry_fails_if_reselected_server_lacks_retryable_write_support() {
    let options = ExecutionOptions::builder().retry_writes(true).build();
    let mut topology = ScriptedTopology::new();
    let mut non_retryable = primary_description("primary-2", SUPPORTS_OP_MSG);
    non_retryable.supports_retryable_writes = false;
    topology
        .push_selection(ScriptedSelection::Server(primary_description(
            "primary-1",
            SUPPORTS_OP_MSG,
        )))
        .push_selection(ScriptedSelection::Server(non_retryable));

    let mut operation = ScriptedOperation::new("insert", Aspects::WRITE | Aspects::RETRYABLE)
        .push_attempt(ScriptedAttempt::Err(network_error("ECONNRESET")));

    let mut session = Session::new();
    let coordinator = Coordinator::new();
    let error = coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect_err("re-selected server must support retryable writes");

    assert!(matches!(error.kind(), ErrorKind::UnexpectedServerResponse { .. }));
    assert_eq!(operation.attempt_count(), 1, "the doomed second attempt is never made");
}

// Retry policy: when re-selection yields no server at all, a clear error is surfaced.
#[tokio::test]
async fn retry_fails_cleanly_when_reselection_finds_no_server() {
    let options = ExecutionOptions::builder().retry_writes(true).build();
    let mut topology = ScriptedTopology::new();
    topology
        .push_selection(ScriptedSelection::Server(primary_description(
            "primary-1",
            SUPPORTS_OP_MSG,
        )))
        .push_selection(ScriptedSelection::None);

    let mut operation = ScriptedOperation::new("insert", Aspects::WRITE | Aspects::RETRYABLE)
        .push_attempt(ScriptedAttempt::Err(network_error("ECONNRESET")));

    let mut session = Session::new();
    let coordinator = Coordinator::new();
    let error = coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect_err("re-selection finding nothing must surface an error");

    assert!(matches!(error.kind(), ErrorKind::UnexpectedServerResponse { .. }));
}

// Invariant 2: when retry is not armed (retry_writes defaults off), the txn number is untouched
// even though the operation itself is marked RETRYABLE.
#[tokio::test]
async fn txn_number_unchanged_when_retry_writes_defaults_off() {
    let options = ExecutionOptions::default();
    let mut topology = ScriptedTopology::new();
    topology.push_selection(ScriptedSelection::Server(primary_description(
        "primary-1",
        SUPPORTS_OP_MSG,
    )));

    let mut operation = ScriptedOperation::new("insert", Aspects::WRITE | Aspects::RETRYABLE)
        .push_attempt(ScriptedAttempt::Ok("{ok:1}".to_string()));

    let mut session = Session::new();
    let coordinator = Coordinator::new();
    coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect("first attempt should succeed");

    assert_eq!(session.txn_number(), 0);
}

// Lazy unpin: a committed transaction's pin is cleared the next time an operation observes it,
// unless the operation sets BYPASS_PINNING_CHECK.
#[tokio::test]
async fn committed_transaction_pin_is_lazily_cleared() {
    let options = ExecutionOptions::default();
    let mut topology = ScriptedTopology::new();
    topology.push_selection(ScriptedSelection::Server(primary_description(
        "primary-1",
        SUPPORTS_OP_MSG,
    )));

    let mut operation = ScriptedOperation::new("find", Aspects::READ).push_attempt(ScriptedAttempt::Ok(
        "{}".to_string(),
    ));

    let mut session = Session::new();
    session.start_transaction();
    session.pin(ServerAddress::new("primary-1"));
    session.commit_transaction();

    let coordinator = Coordinator::new();
    coordinator
        .execute(&topology, &mut operation, Some(&mut session), &options)
        .await
        .expect("execution should succeed");

    assert_eq!(session.transaction().pinned_server(), None);
}
