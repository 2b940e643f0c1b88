use crate::failure::{Failure, RequestContext};
use crate::render::Renderer;
use axum::{body::Bytes, http::HeaderValue};
use serde_json::json;

const HIDDEN_MESSAGE: &str = "An unexpected error occurred";

/// Renders a JSON error document.
///
/// ```json
/// { "message": "...", "errorId": "...", "path": "/users/1", "timestamp": "..." }
/// ```
///
/// `errorId` matches the id logged for the failure. With messages hidden the
/// body carries a generic message, so internals stay out of responses while
/// the id still points at the log entry.
#[derive(Debug, Clone)]
pub struct JsonRenderer {
    expose_messages: bool,
}

impl Default for JsonRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonRenderer {
    pub fn new() -> Self {
        Self {
            expose_messages: true,
        }
    }

    pub fn expose_messages(mut self, expose: bool) -> Self {
        self.expose_messages = expose;
        self
    }
}

impl Renderer for JsonRenderer {
    fn content_type(&self) -> HeaderValue {
        HeaderValue::from_static("application/json")
    }

    fn render(&self, failure: &Failure, request: Option<&RequestContext>) -> Bytes {
        let message = if self.expose_messages {
            failure.message()
        } else {
            HIDDEN_MESSAGE
        };

        let mut body = json!({
            "message": message,
            "errorId": failure.id(),
            "timestamp": failure.occurred_at().to_rfc3339(),
        });
        if let Some(request) = request {
            body["path"] = json!(request.path());
        }

        Bytes::from(body.to_string())
    }
}
