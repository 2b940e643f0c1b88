use crate::config::InterceptorSettings;
use crate::error::{FaultgateError, Result};
use crate::failure::SeverityMask;
use crate::interceptor::ErrorInterceptor;
use crate::logging::{FailureLogger, TracingLogger};
use crate::render::{RenderFormat, Renderer};
use axum::http::StatusCode;
use std::io::Write;
use std::sync::Arc;

/// Builder for an [`ErrorInterceptor`]
///
/// # Example
/// ```
/// use faultgate::ErrorInterceptor;
/// use faultgate::render::JsonRenderer;
///
/// let interceptor = ErrorInterceptor::builder()
///     .status(500)
///     .renderer(JsonRenderer::new().expose_messages(false))
///     .tracing_logger()
///     .build()
///     .unwrap();
/// ```
pub struct ErrorInterceptorBuilder {
    pub(super) status: u16,
    pub(super) render: RenderFormat,
    pub(super) expose_messages: bool,
    pub(super) renderer: Option<Arc<dyn Renderer>>,
    pub(super) logger: Option<Arc<dyn FailureLogger>>,
    pub(super) handled_severities: SeverityMask,
    pub(super) error_reporting: Option<SeverityMask>,
    pub(super) log_caught: bool,
    pub(super) output: Option<Box<dyn Write + Send>>,
}

impl ErrorInterceptorBuilder {
    pub fn new() -> Self {
        Self::from_settings(InterceptorSettings::default())
    }

    /// Start from loaded settings; later calls override them.
    pub fn from_settings(settings: InterceptorSettings) -> Self {
        Self {
            status: settings.status,
            render: settings.render,
            expose_messages: settings.expose_messages,
            renderer: None,
            logger: None,
            handled_severities: settings.handled_severities,
            error_reporting: settings.error_reporting,
            log_caught: settings.log_caught,
            output: None,
        }
    }

    /// Status code of every failure response (404 unless set)
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Replace the body renderer; takes precedence over the configured format
    pub fn renderer(mut self, renderer: impl Renderer) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn logger(mut self, logger: impl FailureLogger) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    pub fn shared_logger(mut self, logger: Arc<dyn FailureLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Log through `tracing`
    pub fn tracing_logger(self) -> Self {
        self.logger(TracingLogger)
    }

    /// Severities to register for on the runtime-error channel
    pub fn handled_severities(mut self, severities: SeverityMask) -> Self {
        self.handled_severities = severities;
        self
    }

    /// Process-wide reporting mask to apply while started
    pub fn error_reporting(mut self, mask: SeverityMask) -> Self {
        self.error_reporting = Some(mask);
        self
    }

    pub fn log_caught(mut self, enabled: bool) -> Self {
        self.log_caught = enabled;
        self
    }

    /// Where uncaught failure bodies are written (stdout unless set)
    pub fn output(mut self, output: impl Write + Send + 'static) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    pub fn build(self) -> Result<ErrorInterceptor> {
        let status =
            StatusCode::from_u16(self.status).map_err(|_| FaultgateError::InvalidStatus(self.status))?;
        Ok(ErrorInterceptor::assemble(self, status))
    }
}

impl Default for ErrorInterceptorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
