//! Selector Resolver: maps an operation's aspects, read preference, and session-pinning state
//! to the concrete [`SelectionCriteria`] used for a given attempt.

use crate::{
    aspect::Aspects,
    error::{Error, ErrorKind, Result},
    operation::Operation,
    selection_criteria::{ReadPreference, SelectionCriteria},
    server::ServerDescription,
    session::Session,
};

/// Pre-flight checks run before a selector is even computed. Returns an error if the operation
/// may not run at all given the session's current transaction state.
pub(crate) fn preflight<Op: Operation>(operation: &Op, session: Option<&mut Session>) -> Result<()> {
    let Some(session) = session else {
        return Ok(());
    };

    if session.transaction().in_transaction() {
        let read_pref_is_primary = operation
            .selection_criteria()
            .map(SelectionCriteria::is_read_pref_primary)
            .unwrap_or(true);

        if !read_pref_is_primary {
            return Err(Error::new(ErrorKind::Transaction {
                message: "read preference in a transaction must be primary".to_string(),
            }));
        }
    }

    if session.transaction().is_committed()
        && session.transaction().pinned_server().is_some()
        && !operation.aspects().contains(Aspects::BYPASS_PINNING_CHECK)
    {
        session.unpin();
    }

    Ok(())
}

/// Computes the selection criteria to use for one attempt.
pub(crate) fn resolve_selector<Op: Operation>(
    operation: &Op,
    common_wire_version: i32,
) -> SelectionCriteria {
    if operation.aspects().contains(Aspects::CURSOR_ITERATING) {
        if let Some(address) = operation.pinned_server().cloned() {
            return SelectionCriteria::Predicate(std::sync::Arc::new(move |description: &ServerDescription| {
                description.address == address
            }));
        }
    }

    if operation.try_secondary_write() {
        let read_pref = operation
            .selection_criteria()
            .and_then(SelectionCriteria::as_read_pref)
            .copied()
            .unwrap_or_default();

        return SelectionCriteria::Predicate(std::sync::Arc::new(move |description: &ServerDescription| {
            description.server_type.is_writable()
                || (!read_pref.is_primary() && common_wire_version >= crate::topology::SUPPORTS_OP_MSG)
        }));
    }

    operation
        .selection_criteria()
        .cloned()
        .unwrap_or_else(|| SelectionCriteria::ReadPreference(ReadPreference::default()))
}
