//! Thin wrappers around `tracing` so the rest of the crate can log unconditionally while the
//! dependency itself stays behind the `tracing-unstable` feature, mirroring the reference
//! driver's approach to an API surface it isn't ready to stabilize.

macro_rules! trace_event {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing-unstable")]
        tracing::trace!($($arg)*);
    };
}

macro_rules! warn_event {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing-unstable")]
        tracing::warn!($($arg)*);
    };
}

pub(crate) use trace_event;
pub(crate) use warn_event;
