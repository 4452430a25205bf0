use bitflags::bitflags;

bitflags! {
    /// The set of capability flags an [`Operation`](crate::operation::Operation) advertises to
    /// the coordinator. Operations are polymorphic by this flag set rather than by a class
    /// hierarchy: a find-and-continue-a-cursor operation simply sets both `READ` and
    /// `CURSOR_ITERATING`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Aspects: u8 {
        /// The operation reads data.
        const READ = 0b0000_0001;
        /// The operation writes data.
        const WRITE = 0b0000_0010;
        /// The operation is eligible for the single-retry state machine.
        const RETRYABLE = 0b0000_0100;
        /// The operation opens a new cursor (e.g. the initial `find`/`aggregate`).
        const CURSOR_CREATING = 0b0000_1000;
        /// The operation continues an already-opened cursor (e.g. `getMore`).
        const CURSOR_ITERATING = 0b0001_0000;
        /// The operation should run even if the session is pinned and its transaction has
        /// committed, skipping the lazy-unpin check.
        const BYPASS_PINNING_CHECK = 0b0010_0000;
    }
}

/// The level of retry the coordinator has armed for the current attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retryability {
    /// No retry is armed; a failure on the first attempt is terminal.
    None,
    /// A read-retry is armed.
    Read,
    /// A write-retry is armed.
    Write,
}
