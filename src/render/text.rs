use crate::failure::{Failure, RequestContext};
use crate::render::Renderer;
use axum::body::Bytes;

/// Renders the failure message verbatim as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl Renderer for PlainTextRenderer {
    fn render(&self, failure: &Failure, _request: Option<&RequestContext>) -> Bytes {
        Bytes::from(failure.message().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;

    #[test]
    fn test_message_is_not_escaped() {
        let failure = Failure::new(FailureKind::Error, "<b>boom</b> & \"more\"");
        assert_eq!(PlainTextRenderer.render(&failure, None), Bytes::from("<b>boom</b> & \"more\""));
    }
}
