use crate::failure::BoxError;
use crate::interceptor::{ErrorInterceptor, Next};
use axum::{body::Body, http::Request, response::Response};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower Layer running an [`ErrorInterceptor`] around the wrapped service
///
/// The resulting service never fails: errors and panics from the inner
/// service become responses, so it can sit directly on an axum `Router`.
#[derive(Clone)]
pub struct ErrorInterceptorLayer {
    interceptor: ErrorInterceptor,
}

impl ErrorInterceptorLayer {
    pub fn new(interceptor: ErrorInterceptor) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for ErrorInterceptorLayer {
    type Service = ErrorInterceptorMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorInterceptorMiddleware {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ErrorInterceptorMiddleware<S> {
    inner: S,
    interceptor: ErrorInterceptor,
}

impl<S> Service<Request<Body>> for ErrorInterceptorMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    // Readiness of the inner service is awaited inside the call, where its
    // errors can still be turned into a response.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let interceptor = self.interceptor.clone();
        let inner = self.inner.clone();

        Box::pin(async move { Ok(interceptor.process(request, Next::service(inner)).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::TEST_LOCK;
    use crate::failure::{ErrorException, Raised, Severity, SeverityMask};
    use axum::{Router, http::StatusCode, routing::get};
    use tower::ServiceExt;
    use tower_http::trace::TraceLayer;

    async fn ok_handler() -> &'static str {
        "fine"
    }

    async fn panicking_handler() -> &'static str {
        if std::hint::black_box(true) {
            panic!("boom");
        }
        "unreachable"
    }

    async fn failing_handler() -> Result<&'static str, (StatusCode, String)> {
        Err((StatusCode::CONFLICT, "handled by axum".to_string()))
    }

    async fn raising_handler() -> Result<&'static str, Raised> {
        let port: u16 = "http".parse()?;
        Ok(if port > 0 { "parsed" } else { "zero" })
    }

    async fn deprecated_handler() -> Result<&'static str, Raised> {
        crate::trigger_error!(Severity::Deprecated, "v1 route is deprecated")?;
        Ok("v1")
    }

    fn app() -> Router {
        Router::new()
            .route("/ok", get(ok_handler))
            .route("/panic", get(panicking_handler))
            .route("/conflict", get(failing_handler))
            .route("/raise", get(raising_handler))
            .route("/v1", get(deprecated_handler))
            .layer(ErrorInterceptor::new().layer())
            .layer(TraceLayer::new_for_http())
    }

    async fn send(app: Router, path: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_router_passes_success_through() {
        assert_eq!(send(app(), "/ok").await, (StatusCode::OK, "fine".to_string()));
    }

    #[tokio::test]
    async fn test_router_panic_becomes_404_with_message() {
        assert_eq!(send(app(), "/panic").await, (StatusCode::NOT_FOUND, "boom".to_string()));
    }

    #[tokio::test]
    async fn test_router_error_responses_are_not_failures() {
        assert_eq!(
            send(app(), "/conflict").await,
            (StatusCode::CONFLICT, "handled by axum".to_string())
        );
    }

    #[tokio::test]
    async fn test_router_raised_error_is_rendered() {
        assert_eq!(
            send(app(), "/raise").await,
            (StatusCode::NOT_FOUND, "invalid digit found in string".to_string())
        );
    }

    #[tokio::test]
    async fn test_router_runtime_error_escalates_only_when_reported() {
        let _guard = TEST_LOCK.lock();
        let interceptor = ErrorInterceptor::new();
        interceptor.start().unwrap();

        let previous = crate::channels::set_error_reporting(SeverityMask::all());
        let escalated = send(app(), "/v1").await;
        crate::channels::set_error_reporting(SeverityMask::all().without(Severity::Deprecated));
        let suppressed = send(app(), "/v1").await;
        crate::channels::set_error_reporting(previous);
        interceptor.stop().unwrap();

        assert_eq!(escalated, (StatusCode::NOT_FOUND, "v1 route is deprecated".to_string()));
        assert_eq!(suppressed, (StatusCode::OK, "v1".to_string()));
    }

    #[derive(Clone)]
    struct Unready;

    impl Service<Request<Body>> for Unready {
        type Response = Response;
        type Error = ErrorException;
        type Future = std::future::Ready<Result<Response, ErrorException>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Err(ErrorException::new(Severity::Error, "backend unavailable", "", 0)))
        }

        fn call(&mut self, _request: Request<Body>) -> Self::Future {
            std::future::ready(Ok(Response::new(Body::empty())))
        }
    }

    #[tokio::test]
    async fn test_inner_service_errors_become_responses() {
        let service = ErrorInterceptor::builder()
            .status(503)
            .build()
            .unwrap()
            .layer()
            .layer(Unready);

        let response = service
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"backend unavailable");
    }
}
