use crate::channels::{self, RuntimeErrorHandler, UncaughtHandler};
use crate::error::{FaultgateError, Result};
use crate::failure::{ErrorException, Failure, RaisedFailure, RequestContext, Severity, SeverityMask};
use crate::interceptor::{ErrorInterceptorBuilder, ErrorInterceptorLayer, Interceptor, InterceptorResult, Next};
use crate::logging::{self, FailureLogger};
use crate::render::{RenderedResponse, Renderer};
use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// Converts failures into HTTP responses.
///
/// Inside a request pipeline, [`process`](Self::process) turns an error or
/// panic from the downstream handler into a response. Outside of one,
/// [`start`](Self::start) registers the interceptor on the process-wide
/// channels so escaped panics and runtime errors are still answered.
///
/// Clones share state; start and stop any one of them.
#[derive(Clone)]
pub struct ErrorInterceptor {
    core: Arc<Core>,
}

struct Core {
    status: StatusCode,
    renderer: Arc<dyn Renderer>,
    logger: Option<Arc<dyn FailureLogger>>,
    handled_severities: SeverityMask,
    error_reporting: Option<SeverityMask>,
    log_caught: bool,
    output: Mutex<Box<dyn Write + Send>>,
    installation: Mutex<Option<Installation>>,
}

struct Installation {
    previous_reporting: Option<SeverityMask>,
}

impl ErrorInterceptor {
    /// An interceptor with default settings: 404, plain-text message, no logger.
    pub fn new() -> Self {
        Self::assemble(ErrorInterceptorBuilder::new(), StatusCode::NOT_FOUND)
    }

    pub fn builder() -> ErrorInterceptorBuilder {
        ErrorInterceptorBuilder::new()
    }

    pub(super) fn assemble(builder: ErrorInterceptorBuilder, status: StatusCode) -> Self {
        let renderer = builder
            .renderer
            .unwrap_or_else(|| builder.render.renderer(builder.expose_messages));
        let output = builder
            .output
            .unwrap_or_else(|| Box::new(io::stdout()));

        Self {
            core: Arc::new(Core {
                status,
                renderer,
                logger: builder.logger,
                handled_severities: builder.handled_severities,
                error_reporting: builder.error_reporting,
                log_caught: builder.log_caught,
                output: Mutex::new(output),
                installation: Mutex::new(None),
            }),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.core.status
    }

    /// Tower layer running this interceptor around the wrapped service.
    pub fn layer(&self) -> ErrorInterceptorLayer {
        ErrorInterceptorLayer::new(self.clone())
    }

    /// Registers on the runtime-error and uncaught channels, saving the
    /// handlers that were active.
    ///
    /// Call once at startup and pair with [`stop`](Self::stop).
    pub fn start(&self) -> Result<()> {
        let mut installation = self.core.installation.lock();
        if installation.is_some() {
            return Err(FaultgateError::AlreadyStarted);
        }

        channels::set_runtime_error_handler(self.core.clone(), self.core.handled_severities);
        channels::set_uncaught_handler(self.core.clone());
        let previous_reporting = self.core.error_reporting.map(channels::set_error_reporting);
        *installation = Some(Installation { previous_reporting });

        tracing::info!(
            status = %self.core.status,
            handled = %self.core.handled_severities,
            reporting = %channels::error_reporting(),
            "Error interceptor started"
        );
        Ok(())
    }

    /// Restores the handlers that were active before [`start`](Self::start).
    ///
    /// Installations nest: this interceptor must be the most recently started
    /// one still running.
    pub fn stop(&self) -> Result<()> {
        let mut installation = self.core.installation.lock();
        let Some(current) = installation.as_ref() else {
            return Err(FaultgateError::NotStarted);
        };
        if !self.is_current() {
            return Err(FaultgateError::NotTopmost);
        }

        channels::restore_runtime_error_handler();
        channels::restore_uncaught_handler();
        if let Some(previous) = current.previous_reporting {
            channels::set_error_reporting(previous);
        }
        *installation = None;

        tracing::info!("Error interceptor stopped");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.core.installation.lock().is_some()
    }

    fn is_current(&self) -> bool {
        let core = Arc::as_ptr(&self.core) as *const ();
        let runtime = channels::runtime_error_handler()
            .is_some_and(|handler| Arc::as_ptr(&handler) as *const () == core);
        let uncaught = channels::uncaught_handler()
            .is_some_and(|handler| Arc::as_ptr(&handler) as *const () == core);
        runtime && uncaught
    }

    /// Runs the downstream handler, answering any error or panic it raises.
    ///
    /// A response carrying a [`Raised`](crate::failure::Raised) failure counts
    /// as raised. Any other response passes through untouched. There is no
    /// retry.
    pub async fn process(&self, request: Request<Body>, next: Next) -> Response {
        let context = RequestContext::capture(&request);

        let failure = match channels::catch_future(next.run(request)).await {
            Ok(Ok(mut response)) => match response.extensions_mut().remove::<RaisedFailure>() {
                Some(RaisedFailure(failure)) => failure,
                None => return response,
            },
            Ok(Err(error)) => Failure::from_error(error),
            Err(failure) => failure,
        };

        tracing::debug!(
            failure.id = %failure.id(),
            failure.kind = %failure.kind(),
            method = %context.method,
            uri = %context.uri,
            "Recovered failure in request pipeline"
        );
        if self.core.log_caught {
            self.log(&failure);
        }

        self.build_response(&failure, Some(&context)).into_response()
    }

    /// Escalates a runtime error whose severity is in the process-wide
    /// reporting mask; anything else is suppressed with `Ok(())`.
    pub fn handle_runtime_error(
        &self,
        severity: Severity,
        message: &str,
        file: &str,
        line: u32,
    ) -> std::result::Result<(), ErrorException> {
        self.core.handle_runtime_error(severity, message, file, line)
    }

    /// Last-resort path for a failure nothing else caught: logs it, then
    /// writes the rendered body to the output.
    pub fn emit_uncaught_exception(&self, failure: &Failure) {
        self.core.emit_uncaught(failure);
    }

    /// The response for `failure`. Does not log.
    pub fn build_response(&self, failure: &Failure, request: Option<&RequestContext>) -> RenderedResponse {
        self.core.build_response(failure, request)
    }

    pub fn render(&self, failure: &Failure, request: Option<&RequestContext>) -> Bytes {
        self.core.renderer.render(failure, request)
    }

    /// Logs `failure` when a logger is configured.
    pub fn log(&self, failure: &Failure) {
        self.core.log(failure);
    }
}

impl Default for ErrorInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorInterceptor")
            .field("status", &self.core.status)
            .field("handled_severities", &self.core.handled_severities)
            .field("logger", &self.core.logger.is_some())
            .field("started", &self.is_started())
            .finish()
    }
}

impl Core {
    fn build_response(&self, failure: &Failure, request: Option<&RequestContext>) -> RenderedResponse {
        RenderedResponse::new(
            self.status,
            self.renderer.content_type(),
            self.renderer.render(failure, request),
        )
    }

    fn log(&self, failure: &Failure) {
        if let Some(logger) = &self.logger {
            logging::log_guarded(logger.as_ref(), failure);
        }
    }
}

impl RuntimeErrorHandler for Core {
    fn handle_runtime_error(
        &self,
        severity: Severity,
        message: &str,
        file: &str,
        line: u32,
    ) -> std::result::Result<(), ErrorException> {
        if channels::error_reporting().contains(severity) {
            return Err(ErrorException::new(severity, message, file, line));
        }
        Ok(())
    }
}

impl UncaughtHandler for Core {
    fn emit_uncaught(&self, failure: &Failure) {
        self.log(failure);
        let response = self.build_response(failure, None);

        let written = channels::catch(|| {
            let mut output = self.output.lock();
            output.write_all(response.body())?;
            output.flush()
        });
        match written {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(failure.id = %failure.id(), %error, "Failed to write uncaught failure response")
            }
            Err(panicked) => {
                tracing::warn!(failure.id = %failure.id(), %panicked, "Output panicked while writing uncaught failure response")
            }
        }
    }
}

#[async_trait]
impl Interceptor for ErrorInterceptor {
    async fn intercept(&self, request: Request<Body>, next: Next) -> InterceptorResult {
        Ok(self.process(request, next).await)
    }
}
