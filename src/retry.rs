//! Retry Policy: decides whether a failed first attempt earns a second one, and prepares the
//! state (unpinning, re-selection, wire-version recheck) for that second attempt.
//!
//! The policy never grants more than one retry; callers run the second attempt themselves once
//! [`plan_retry`] hands back the server to use.

use crate::{
    aspect::Retryability,
    classify::{is_retryable_read_error, is_retryable_write_error, remap_legacy_retryable_write_error},
    error::{Error, ErrorKind},
    log::warn_event,
    selection_criteria::SelectionCriteria,
    server::{Server, ServerAddress},
    session::Session,
    topology::{Topology, SUPPORTS_OP_MSG},
};

/// Runs the Retry Policy against a failed first attempt. On `Ok`, the caller should run the
/// second (and final) attempt against the returned server. On `Err`, `error` (possibly remapped)
/// is terminal and must be surfaced unchanged.
pub(crate) async fn plan_retry<Top: Topology>(
    topology: &Top,
    retryability: Retryability,
    selector: &SelectionCriteria,
    session: Option<&mut Session>,
    is_cursor_creating: bool,
    mut error: Error,
    snapshotted_max_wire_version: i32,
) -> std::result::Result<Server, Error> {
    // The legacy MMAPv1 refusal is checked ahead of the general retryability classification: a
    // pre-4.0 deployment that rejects transaction numbers outright reports plain `IllegalOperation`,
    // which would not otherwise look retryable, but still earns the stable remap rather than a
    // raw, deployment-specific error message reaching the caller.
    if retryability == Retryability::Write && remap_legacy_retryable_write_error(&mut error) {
        warn_event!(message = "legacy retryable write refusal, remapping", code = crate::error::ILLEGAL_OPERATION_CODE);
        return Err(error);
    }

    let is_retryable = match retryability {
        Retryability::None => false,
        Retryability::Read => is_retryable_read_error(&error),
        Retryability::Write => is_retryable_write_error(&error, snapshotted_max_wire_version),
    };

    if !is_retryable {
        return Err(error);
    }

    let mut unpinned_address: Option<ServerAddress> = None;
    if let Some(session) = session {
        if is_cursor_creating && error.is_network_error() && !session.transaction().in_transaction() {
            if let Some(pinned) = session.transaction().pinned_server().cloned() {
                session.unpin();
                unpinned_address = Some(pinned);
            }
        }
    }

    if let Some(address) = unpinned_address {
        warn_event!(message = "forcing unpin after cursor-creating network error", address = %address);
        topology.clear_pool_for_pinned_server(&address).await;
    }

    let reselected = topology.select_server(selector).await?;

    let server = reselected.ok_or_else(|| {
        Error::new(ErrorKind::UnexpectedServerResponse {
            message: "server selection failed without error".to_string(),
        })
    })?;

    match retryability {
        Retryability::Read => {
            if server.description.max_wire_version.unwrap_or(0) < SUPPORTS_OP_MSG {
                return Err(Error::new(ErrorKind::UnexpectedServerResponse {
                    message: "re-selected server does not support retryable reads".to_string(),
                }));
            }
        }
        Retryability::Write => {
            if !server.description.supports_retryable_writes {
                return Err(Error::new(ErrorKind::UnexpectedServerResponse {
                    message: "re-selected server does not support retryable writes".to_string(),
                }));
            }
        }
        Retryability::None => unreachable!("checked above"),
    }

    Ok(server)
}
