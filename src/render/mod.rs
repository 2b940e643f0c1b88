//! Response rendering.
//!
//! A [`Renderer`] maps a captured failure, and the request it interrupted when
//! there was one, to the bytes of a response body. The interceptor owns the
//! status code; renderers only decide content.

mod json;
mod text;

pub use json::JsonRenderer;
pub use text::PlainTextRenderer;

use crate::failure::{Failure, RequestContext};
use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum_macros::{Display, EnumString};

/// Strategy that turns a failure into a response body.
///
/// Any `Fn(&Failure, Option<&RequestContext>) -> Bytes` closure is a renderer
/// producing plain text.
pub trait Renderer: Send + Sync + 'static {
    fn content_type(&self) -> HeaderValue {
        HeaderValue::from_static("text/plain; charset=utf-8")
    }

    fn render(&self, failure: &Failure, request: Option<&RequestContext>) -> Bytes;
}

impl<F> Renderer for F
where
    F: Fn(&Failure, Option<&RequestContext>) -> Bytes + Send + Sync + 'static,
{
    fn render(&self, failure: &Failure, request: Option<&RequestContext>) -> Bytes {
        self(failure, request)
    }
}

/// Built-in renderers selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    #[default]
    Text,
    Json,
}

impl RenderFormat {
    pub fn renderer(self, expose_messages: bool) -> Arc<dyn Renderer> {
        match self {
            RenderFormat::Text => Arc::new(PlainTextRenderer),
            RenderFormat::Json => Arc::new(JsonRenderer::new().expose_messages(expose_messages)),
        }
    }
}

/// The response produced for one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResponse {
    status: StatusCode,
    content_type: HeaderValue,
    body: Bytes,
}

impl RenderedResponse {
    pub fn new(status: StatusCode, content_type: HeaderValue, body: Bytes) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> &HeaderValue {
        &self.content_type
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl IntoResponse for RenderedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().insert(CONTENT_TYPE, self.content_type);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;

    #[tokio::test]
    async fn test_rendered_response_into_response() {
        let rendered = RenderedResponse::new(
            StatusCode::NOT_FOUND,
            HeaderValue::from_static("text/plain; charset=utf-8"),
            Bytes::from_static(b"boom"),
        );
        let response = rendered.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"boom");
    }

    #[test]
    fn test_closure_is_a_renderer() {
        let renderer = |failure: &Failure, _: Option<&RequestContext>| {
            Bytes::from(format!("oops: {}", failure.message()))
        };
        let failure = Failure::new(FailureKind::Error, "disk full");
        assert_eq!(renderer.render(&failure, None), Bytes::from("oops: disk full"));
        assert_eq!(renderer.content_type(), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_render_format_from_str() {
        assert_eq!("JSON".parse::<RenderFormat>().unwrap(), RenderFormat::Json);
        assert_eq!("text".parse::<RenderFormat>().unwrap(), RenderFormat::Text);
        assert!("html".parse::<RenderFormat>().is_err());
        assert_eq!(RenderFormat::Json.renderer(true).content_type(), "application/json");
    }
}
