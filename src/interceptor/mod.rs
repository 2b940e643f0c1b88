use crate::failure::BoxError;
use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use std::future::Future;
use std::pin::Pin;
use tower::{Service, ServiceExt};

mod builder;
mod handler;
mod layer;

pub use builder::ErrorInterceptorBuilder;
pub use handler::ErrorInterceptor;
pub use layer::{ErrorInterceptorLayer, ErrorInterceptorMiddleware};

/// standard return type for Interceptors
pub type InterceptorResult = Result<Response, InterceptorError>;

/// A type-erased error for interceptors
pub type InterceptorError = BoxError;

type BoxFuture = Pin<Box<dyn Future<Output = InterceptorResult> + Send>>;

type BoxedRun = Box<dyn FnOnce(Request<Body>) -> BoxFuture + Send>;

/// Represents the next handler in the chain
pub struct Next {
    run: BoxedRun,
}

impl Next {
    /// Create a new Next handler
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Request<Body>) -> Fut + Send + 'static,
        Fut: Future<Output = InterceptorResult> + Send + 'static,
    {
        Self {
            run: Box::new(move |request| -> BoxFuture { Box::pin(f(request)) }),
        }
    }

    /// Wrap a tower service as the next handler
    ///
    /// Readiness and the call itself both run when the chain is driven, so
    /// errors from either surface as the handler's error.
    pub fn service<S>(service: S) -> Self
    where
        S: Service<Request<Body>, Response = Response> + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<BoxError>,
    {
        Self::new(move |request| async move {
            service.oneshot(request).await.map_err(Into::<BoxError>::into)
        })
    }

    /// Execute the next handler
    pub async fn run(self, request: Request<Body>) -> InterceptorResult {
        (self.run)(request).await
    }
}

/// The Interceptor trait
///
/// Interceptors wrap the rest of the chain: they see the request before the
/// handler does and the outcome after it returns.
///
/// # Example
/// ```
/// use faultgate::interceptor::{Interceptor, InterceptorResult, Next};
/// use faultgate::async_trait;
/// use axum::{body::Body, http::Request};
///
/// struct Timing;
///
/// #[async_trait]
/// impl Interceptor for Timing {
///     async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
///         let start = std::time::Instant::now();
///         let response = next.run(request).await?;
///         tracing::debug!(elapsed = ?start.elapsed(), "handled");
///         Ok(response)
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult;
}
