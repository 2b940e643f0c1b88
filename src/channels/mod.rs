//! Process-wide failure channels.
//!
//! Two single-slot channels carry failures that happen outside any call chain
//! the interceptor controls:
//!
//! - the **runtime-error channel**, fed by [`trigger_error`], which hands
//!   `(severity, message, file, line)` to the active [`RuntimeErrorHandler`];
//! - the **uncaught channel**, fed by the panic hook and by [`emit_uncaught`],
//!   which hands escaped failures to the active [`UncaughtHandler`].
//!
//! Installing a handler saves the active one; restoring brings it back, so
//! installations nest like a stack. The process-wide reporting mask lives here
//! too.
//!
//! These are global resources. Install and restore them from application
//! startup and shutdown code, not per request.

mod catch;

pub use catch::{CatchPanic, catch, catch_future};

use crate::failure::{ErrorException, Failure, Severity, SeverityMask};
use parking_lot::Mutex;
use std::panic::{self, PanicHookInfo};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

/// Receives runtime errors raised through [`trigger_error`].
pub trait RuntimeErrorHandler: Send + Sync {
    /// `Ok(())` lets execution continue; `Err` escalates the runtime error to
    /// the caller of [`trigger_error`].
    fn handle_runtime_error(
        &self,
        severity: Severity,
        message: &str,
        file: &str,
        line: u32,
    ) -> Result<(), ErrorException>;
}

/// Receives failures that escaped every catch frame.
pub trait UncaughtHandler: Send + Sync {
    fn emit_uncaught(&self, failure: &Failure);
}

struct RuntimeSlot {
    handler: Arc<dyn RuntimeErrorHandler>,
    severities: SeverityMask,
}

struct Channels {
    runtime: Vec<RuntimeSlot>,
    uncaught: Vec<Arc<dyn UncaughtHandler>>,
}

static CHANNELS: Mutex<Channels> = Mutex::new(Channels {
    runtime: Vec::new(),
    uncaught: Vec::new(),
});

// Held while swapping std's panic hook; never taken from inside the hook.
static PREVIOUS_HOOK: Mutex<Option<PanicHook>> = Mutex::new(None);

static ERROR_REPORTING: AtomicU32 = AtomicU32::new(SeverityMask::all().bits());

/// Installs `handler` for runtime errors whose severity is in `severities`.
pub fn set_runtime_error_handler(handler: Arc<dyn RuntimeErrorHandler>, severities: SeverityMask) {
    CHANNELS.lock().runtime.push(RuntimeSlot { handler, severities });
}

/// Reinstates the runtime-error handler that was active before the last
/// [`set_runtime_error_handler`]. Returns `false` if none was installed.
pub fn restore_runtime_error_handler() -> bool {
    CHANNELS.lock().runtime.pop().is_some()
}

pub fn runtime_error_handler() -> Option<Arc<dyn RuntimeErrorHandler>> {
    CHANNELS
        .lock()
        .runtime
        .last()
        .map(|slot| Arc::clone(&slot.handler))
}

/// Installs `handler` for uncaught failures.
///
/// The first installation replaces std's panic hook; the replaced hook comes
/// back once the last handler is restored. Must not be called while panicking.
pub fn set_uncaught_handler(handler: Arc<dyn UncaughtHandler>) {
    let mut previous = PREVIOUS_HOOK.lock();
    let first = {
        let mut channels = CHANNELS.lock();
        channels.uncaught.push(handler);
        channels.uncaught.len() == 1
    };

    if first {
        *previous = Some(panic::take_hook());
        panic::set_hook(Box::new(catch::dispatch_panic));
        tracing::debug!("Panic hook installed");
    }
}

/// Reinstates the uncaught handler that was active before the last
/// [`set_uncaught_handler`]. Returns `false` if none was installed.
pub fn restore_uncaught_handler() -> bool {
    let mut previous = PREVIOUS_HOOK.lock();
    let (popped, drained) = {
        let mut channels = CHANNELS.lock();
        let popped = channels.uncaught.pop().is_some();
        (popped, channels.uncaught.is_empty())
    };

    if popped && drained {
        if let Some(hook) = previous.take() {
            panic::set_hook(hook);
            tracing::debug!("Panic hook restored");
        }
    }
    popped
}

pub fn uncaught_handler() -> Option<Arc<dyn UncaughtHandler>> {
    CHANNELS.lock().uncaught.last().cloned()
}

/// The severities currently treated as reportable.
pub fn error_reporting() -> SeverityMask {
    SeverityMask::from_bits(ERROR_REPORTING.load(Ordering::SeqCst))
}

/// Replaces the reporting mask, returning the previous one.
pub fn set_error_reporting(mask: SeverityMask) -> SeverityMask {
    SeverityMask::from_bits(ERROR_REPORTING.swap(mask.bits(), Ordering::SeqCst))
}

/// Raises a runtime error on the runtime-error channel.
///
/// The active handler sees it if its severities include `severity`. Without
/// one, the error is logged and execution continues. Prefer the
/// [`trigger_error!`](crate::trigger_error) macro, which fills in the location.
pub fn trigger_error(severity: Severity, message: &str, file: &str, line: u32) -> Result<(), ErrorException> {
    let handler = CHANNELS
        .lock()
        .runtime
        .last()
        .filter(|slot| slot.severities.contains(severity))
        .map(|slot| Arc::clone(&slot.handler));

    match handler {
        Some(handler) => handler.handle_runtime_error(severity, message, file, line),
        None => {
            if severity.is_fatal() {
                tracing::error!(%severity, file, line, "{}", message);
            } else {
                tracing::warn!(%severity, file, line, "{}", message);
            }
            Ok(())
        }
    }
}

/// Hands a failure that escaped everything to the active uncaught handler.
///
/// Use it for errors that reach the top of `main` or a detached task. Without
/// a handler the failure is written to stderr.
pub fn emit_uncaught(failure: &Failure) {
    match uncaught_handler() {
        Some(handler) => handler.emit_uncaught(failure),
        None => {
            eprintln!("Uncaught Exception: {failure}");
        }
    }
}

/// Raises a runtime error with the caller's file and line.
///
/// ```
/// use faultgate::failure::Severity;
///
/// fn lookup(key: &str) -> Result<(), faultgate::failure::ErrorException> {
///     faultgate::trigger_error!(Severity::Notice, "missing key {key}")?;
///     Ok(())
/// }
/// # lookup("a").unwrap();
/// ```
#[macro_export]
macro_rules! trigger_error {
    ($severity:expr, $($arg:tt)+) => {
        $crate::channels::trigger_error(
            $severity,
            &::std::format!($($arg)+),
            ::std::file!(),
            ::std::line!(),
        )
    };
}

#[cfg(test)]
pub(crate) static TEST_LOCK: Mutex<()> = Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    struct Sentinel;

    impl RuntimeErrorHandler for Sentinel {
        fn handle_runtime_error(&self, _: Severity, _: &str, _: &str, _: u32) -> Result<(), ErrorException> {
            Ok(())
        }
    }

    impl UncaughtHandler for Sentinel {
        fn emit_uncaught(&self, _: &Failure) {}
    }

    #[derive(Default)]
    struct Recorder {
        runtime: Mutex<Vec<(Severity, String, String, u32)>>,
        uncaught: Mutex<Vec<Failure>>,
    }

    impl RuntimeErrorHandler for Recorder {
        fn handle_runtime_error(
            &self,
            severity: Severity,
            message: &str,
            file: &str,
            line: u32,
        ) -> Result<(), ErrorException> {
            self.runtime
                .lock()
                .push((severity, message.to_string(), file.to_string(), line));
            Err(ErrorException::new(severity, message, file, line))
        }
    }

    impl UncaughtHandler for Recorder {
        fn emit_uncaught(&self, failure: &Failure) {
            self.uncaught.lock().push(failure.clone());
        }
    }

    fn same<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
        Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
    }

    #[test]
    fn test_handlers_restore_in_stack_order() {
        let _guard = TEST_LOCK.lock();
        let first = Arc::new(Sentinel);
        let second = Arc::new(Sentinel);

        set_runtime_error_handler(first.clone(), SeverityMask::all());
        set_runtime_error_handler(second.clone(), SeverityMask::all());
        assert!(same(&runtime_error_handler().unwrap(), &second));

        assert!(restore_runtime_error_handler());
        assert!(same(&runtime_error_handler().unwrap(), &first));
        assert!(restore_runtime_error_handler());
        assert!(runtime_error_handler().is_none());
        assert!(!restore_runtime_error_handler());

        set_uncaught_handler(first.clone());
        set_uncaught_handler(second.clone());
        assert!(same(&uncaught_handler().unwrap(), &second));
        assert!(restore_uncaught_handler());
        assert!(same(&uncaught_handler().unwrap(), &first));
        assert!(restore_uncaught_handler());
        assert!(uncaught_handler().is_none());
    }

    #[test]
    fn test_trigger_respects_handler_severities() {
        let _guard = TEST_LOCK.lock();
        let recorder = Arc::new(Recorder::default());
        set_runtime_error_handler(recorder.clone(), Severity::Warning.into());

        assert!(trigger_error(Severity::Notice, "ignored", "a.rs", 1).is_ok());
        let escalated = trigger_error(Severity::Warning, "seen", "a.rs", 2).unwrap_err();
        assert_eq!(escalated.message(), "seen");

        restore_runtime_error_handler();
        assert_eq!(
            *recorder.runtime.lock(),
            vec![(Severity::Warning, "seen".to_string(), "a.rs".to_string(), 2)]
        );
    }

    #[test]
    fn test_trigger_without_handler_continues() {
        let _guard = TEST_LOCK.lock();
        assert!(trigger_error(Severity::Error, "nobody listens", "", 0).is_ok());
    }

    #[test]
    fn test_trigger_macro_fills_location() {
        let _guard = TEST_LOCK.lock();
        let recorder = Arc::new(Recorder::default());
        set_runtime_error_handler(recorder.clone(), SeverityMask::all());

        let line = line!() + 1;
        let escalated = crate::trigger_error!(Severity::UserNotice, "value {}", 7).unwrap_err();
        restore_runtime_error_handler();

        assert_eq!(escalated.message(), "value 7");
        assert_eq!(escalated.file(), file!());
        assert_eq!(escalated.line(), line);
    }

    #[test]
    fn test_error_reporting_swap() {
        let _guard = TEST_LOCK.lock();
        let previous = set_error_reporting(Severity::Error.into());
        assert_eq!(error_reporting(), SeverityMask::from(Severity::Error));
        assert_eq!(set_error_reporting(previous), SeverityMask::from(Severity::Error));
        assert_eq!(error_reporting(), previous);
    }

    #[test]
    fn test_panic_outside_frame_reaches_uncaught_handler() {
        let _guard = TEST_LOCK.lock();
        let recorder = Arc::new(Recorder::default());
        set_uncaught_handler(recorder.clone());

        let joined = std::thread::spawn(|| -> () { panic!("detached boom") }).join();
        let caught = catch(|| -> () { panic!("framed boom") });

        restore_uncaught_handler();

        assert!(joined.is_err());
        let uncaught = recorder.uncaught.lock();
        assert_eq!(uncaught.len(), 1);
        assert_eq!(uncaught[0].message(), "detached boom");
        assert_eq!(uncaught[0].location().unwrap().file, file!());

        let framed = caught.unwrap_err();
        assert_eq!(framed.message(), "framed boom");
        assert_eq!(framed.location().unwrap().file, file!());
    }

    #[test]
    fn test_emit_uncaught_dispatches() {
        let _guard = TEST_LOCK.lock();
        let recorder = Arc::new(Recorder::default());
        set_uncaught_handler(recorder.clone());

        emit_uncaught(&Failure::from(ErrorException::new(Severity::Error, "top-level", "", 0)));
        restore_uncaught_handler();

        let uncaught = recorder.uncaught.lock();
        assert_eq!(uncaught.len(), 1);
        assert_eq!(uncaught[0].message(), "top-level");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_emit_uncaught_without_handler_reports_once_on_stderr() {
        let _guard = TEST_LOCK.lock();
        assert!(uncaught_handler().is_none());

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            emit_uncaught(&Failure::from(ErrorException::new(Severity::Error, "lost", "", 0)));
        });

        assert!(captured.0.lock().is_empty());
    }
}
