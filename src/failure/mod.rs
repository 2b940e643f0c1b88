//! Captured failures.
//!
//! A [`Failure`] is built the moment a failure is caught, whether from an error
//! returned downstream, a panic, or an escalated runtime error, and is consumed
//! right away to produce a response.
//!
//! axum handlers return [`Raised`] (or [`ErrorException`]) to hand their errors
//! to the interceptor instead of answering them.

mod context;
mod raised;
mod severity;

pub use context::RequestContext;
pub use raised::Raised;
pub(crate) use raised::RaisedFailure;
pub use severity::{ErrorException, Severity, SeverityMask};

use chrono::{DateTime, Utc};
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A type-erased error, as returned by downstream handlers.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// What kind of failure was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// An error value returned by a handler.
    Error,
    /// A runtime error escalated through the runtime-error channel.
    RuntimeError(Severity),
    /// A panic.
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Error => f.write_str("error"),
            FailureKind::RuntimeError(severity) => write!(f, "runtime_error({severity})"),
            FailureKind::Panic => f.write_str("panic"),
        }
    }
}

/// Source location of a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl From<&std::panic::Location<'_>> for Location {
    fn from(location: &std::panic::Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone)]
pub struct Failure {
    id: Uuid,
    occurred_at: DateTime<Utc>,
    kind: FailureKind,
    message: String,
    location: Option<Location>,
    cause: Option<Arc<dyn Error + Send + Sync>>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            kind,
            message: message.into(),
            location: None,
            cause: None,
        }
    }

    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    /// Captures an error returned by a handler.
    ///
    /// An [`ErrorException`] keeps its severity and origin; any other error
    /// becomes a plain [`FailureKind::Error`]. The error itself is kept as the
    /// cause.
    pub fn from_error(error: BoxError) -> Self {
        let message = error.to_string();
        let (kind, location) = match error.downcast_ref::<ErrorException>() {
            Some(exception) => (
                FailureKind::RuntimeError(exception.severity()),
                (!exception.file().is_empty())
                    .then(|| Location::new(exception.file(), exception.line())),
            ),
            None => (FailureKind::Error, None),
        };

        let mut failure = Self::new(kind, message).with_location(location);
        failure.cause = Some(Arc::from(error));
        failure
    }

    /// Captures a panic from its payload.
    pub fn from_panic(payload: &(dyn Any + Send), location: Option<Location>) -> Self {
        Self::new(FailureKind::Panic, panic_message(payload)).with_location(location)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// The captured error, for failures that came from an error value.
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.cause.as_deref().and_then(|cause| cause.downcast_ref::<E>())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<BoxError> for Failure {
    fn from(error: BoxError) -> Self {
        Self::from_error(error)
    }
}

impl From<ErrorException> for Failure {
    fn from(exception: ErrorException) -> Self {
        Self::from_error(Box::new(exception))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }

    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }

    "Box<dyn Any>".to_string()
}
