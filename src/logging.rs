//! Logging of uncaught failures.
//!
//! The interceptor logs through an optional [`FailureLogger`]. [`TracingLogger`]
//! forwards to `tracing`, so whatever subscriber the application installs
//! receives the entries.

use crate::channels;
use crate::failure::Failure;

/// Message attached to every logged uncaught failure.
pub const UNCAUGHT_EXCEPTION: &str = "Uncaught Exception";

/// Sink for failure log entries.
pub trait FailureLogger: Send + Sync + 'static {
    /// Emits one error-level entry carrying `failure` as context.
    fn error(&self, message: &str, failure: &Failure);
}

/// Logs failures as `tracing` error events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl FailureLogger for TracingLogger {
    fn error(&self, message: &str, failure: &Failure) {
        match failure.location() {
            Some(location) => tracing::error!(
                failure.id = %failure.id(),
                failure.kind = %failure.kind(),
                failure.location = %location,
                exception = %failure,
                "{}",
                message
            ),
            None => tracing::error!(
                failure.id = %failure.id(),
                failure.kind = %failure.kind(),
                exception = %failure,
                "{}",
                message
            ),
        }
    }
}

/// Calls `logger` inside a catch frame.
///
/// A panicking logger must not take down the failure path it is reporting on;
/// its panic is written to stderr and dropped.
pub(crate) fn log_guarded(logger: &dyn FailureLogger, failure: &Failure) {
    if let Err(logger_failure) = channels::catch(|| logger.error(UNCAUGHT_EXCEPTION, failure)) {
        eprintln!(
            "failure logger panicked while logging {}: {}",
            failure.id(),
            logger_failure
        );
    }
}
