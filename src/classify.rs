//! Error Classifier: retryability rules and the legacy storage-engine remap.

use crate::{
    error::{
        Error, ErrorKind, ILLEGAL_OPERATION_CODE, LEGACY_RETRYABLE_WRITES_REMAP_MESSAGE,
        RETRYABLE_WRITE_ERROR,
    },
    topology::SUPPORTS_OP_MSG,
};

/// Whether `error` is retryable as a read: a network error, a state-change error, or one
/// carrying the `RetryableWriteError` label (servers surface the same label for both read and
/// write retryability).
pub(crate) fn is_retryable_read_error(error: &Error) -> bool {
    error.is_network_error() || error.is_state_change_error() || error.contains_label(RETRYABLE_WRITE_ERROR)
}

/// Whether `error` is retryable as a write, given the max wire version observed on the server
/// immediately before the failing attempt.
///
/// Pre-4.0 servers never label their errors, so below [`SUPPORTS_OP_MSG`] the legacy numeric
/// code list is consulted instead.
pub(crate) fn is_retryable_write_error(error: &Error, snapshotted_max_wire_version: i32) -> bool {
    if error.contains_label(RETRYABLE_WRITE_ERROR) || error.is_network_error() {
        return true;
    }

    if snapshotted_max_wire_version < SUPPORTS_OP_MSG {
        if let Some(code) = error.server_code() {
            return crate::error::LEGACY_RETRYABLE_WRITE_CODES.contains(&code);
        }
    }

    false
}

/// If `error` is the legacy MMAPv1/pre-4.0 "transaction numbers not supported" refusal,
/// replaces it with the stable remapped message and returns `true`. Otherwise leaves `error`
/// untouched and returns `false`.
pub(crate) fn remap_legacy_retryable_write_error(error: &mut Error) -> bool {
    let matches = matches!(
        error.kind(),
        ErrorKind::ServerError { code, message }
            if *code == ILLEGAL_OPERATION_CODE && message.contains("Transaction numbers")
    );

    if matches {
        *error = Error::new(ErrorKind::ServerError {
            code: ILLEGAL_OPERATION_CODE,
            message: LEGACY_RETRYABLE_WRITES_REMAP_MESSAGE.to_string(),
        });
    }

    matches
}
