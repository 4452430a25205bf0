//! The client-level options surface the coordinator reads on every call.
//!
//! Parsing a connection string or config file into this surface is a client-construction
//! concern and lives outside this crate; what's here is the small, strongly-typed bag callers
//! assemble once and hand to every `execute` call.

use std::time::Duration;

use typed_builder::TypedBuilder;

/// Client-wide retry and session defaults consulted by the coordinator.
///
/// `retry_reads` and `retry_writes` are deliberately asymmetric: `retry_reads` is opt-out
/// (`None` and `Some(true)` both mean "retry"), while `retry_writes` is opt-in (only
/// `Some(true)` means "retry"). This mirrors the reference driver's own client options and is
/// not a bug to be "fixed" — see the coordinator's retry gating for where each is consulted.
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(strip_option)))]
pub struct ExecutionOptions {
    /// Opt-out switch for retryable reads. `None` behaves like `Some(true)`.
    pub retry_reads: Option<bool>,

    /// Opt-in switch for retryable writes. Only `Some(true)` enables retry.
    pub retry_writes: Option<bool>,

    /// How long a session may sit idle before the server considers it expired. Used only to
    /// decide whether a session is due for proactive renewal; the coordinator itself never
    /// renews a session, it only reads this value.
    pub logical_session_timeout: Option<Duration>,
}

impl ExecutionOptions {
    /// Whether retryable reads are enabled under these options.
    pub fn retry_reads_enabled(&self) -> bool {
        self.retry_reads != Some(false)
    }

    /// Whether retryable writes are enabled under these options.
    pub fn retry_writes_enabled(&self) -> bool {
        self.retry_writes == Some(true)
    }
}
