//! Logging macros.
//!
//! Events go through `tracing` with target `"csvdir"` and carry a `component` and an `event`
//! field. The crate never installs a subscriber; that is left to the embedding application.

pub(crate) const CSVDIR_TARGET: &str = "csvdir";

/// Info-level event.
///
/// ```ignore
/// log_info!(component = "session", event = "session_opened", view = %name);
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::CSVDIR_TARGET, $($field)*)
    };
}

macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::CSVDIR_TARGET, $($field)*)
    };
}

macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::CSVDIR_TARGET, $($field)*)
    };
}

macro_rules! log_error {
    ($($field:tt)*) => {
        ::tracing::error!(target: $crate::observability::CSVDIR_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
