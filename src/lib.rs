//! # Faultgate
//!
//! Error interceptor middleware for axum and tower.
//!
//! Faultgate wraps the rest of a request pipeline and answers every failure it
//! sees with an HTTP response instead of a dropped connection:
//!
//! - **Pipeline failures**: errors raised and panics thrown by downstream
//!   handlers become a response (404 with the failure message, by default).
//!   axum handlers raise errors by returning [`failure::Raised`].
//! - **Runtime errors**: [`trigger_error!`] raises a severity-tagged runtime
//!   error; enabled severities escalate into an error the handler propagates
//!   with `?`, the rest are suppressed.
//! - **Uncaught failures**: once started, panics outside any pipeline are
//!   logged and their rendered body is written to stdout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use faultgate::{ErrorInterceptor, InterceptorSettings};
//! use faultgate::failure::Severity;
//!
//! async fn profile() -> Result<&'static str, faultgate::failure::Raised> {
//!     faultgate::trigger_error!(Severity::Deprecated, "profile v1 is deprecated")?;
//!     Ok("profile")
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = InterceptorSettings::from_env().unwrap();
//!     let interceptor = ErrorInterceptor::builder()
//!         .status(settings.status)
//!         .tracing_logger()
//!         .build()
//!         .unwrap();
//!
//!     // Register for panics and runtime errors outside request handling.
//!     interceptor.start().unwrap();
//!
//!     let app: Router = Router::new()
//!         .route("/profile", get(profile))
//!         .layer(interceptor.layer());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//!
//!     interceptor.stop().unwrap();
//! }
//! ```

pub mod channels;
pub mod config;
pub mod error;
pub mod failure;
pub mod interceptor;
pub mod logging;
pub mod render;

// Re-export core types
pub use config::{ConfigService, InterceptorSettings};
pub use error::{FaultgateError, Result};
pub use failure::{Failure, FailureKind, Raised, RequestContext};
pub use interceptor::{ErrorInterceptor, ErrorInterceptorBuilder, ErrorInterceptorLayer};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use faultgate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::channels::{RuntimeErrorHandler, UncaughtHandler, emit_uncaught};
    pub use crate::config::{ConfigService, InterceptorSettings};
    pub use crate::error::{FaultgateError, Result};
    pub use crate::failure::{
        ErrorException, Failure, FailureKind, Raised, RequestContext, Severity, SeverityMask,
    };
    pub use crate::interceptor::{
        ErrorInterceptor, ErrorInterceptorBuilder, ErrorInterceptorLayer, Interceptor, InterceptorResult, Next,
    };
    pub use crate::logging::{FailureLogger, TracingLogger};
    pub use crate::render::{JsonRenderer, PlainTextRenderer, RenderFormat, RenderedResponse, Renderer};
    pub use crate::trigger_error;
    pub use async_trait::async_trait;
}
