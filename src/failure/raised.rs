use crate::failure::{BoxError, ErrorException, Failure};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Error type for axum handlers whose failures the interceptor should answer.
///
/// axum turns handler errors into responses before any middleware sees them.
/// `Raised` carries the captured [`Failure`] inside that response, and the
/// interceptor replaces the response with its own rendering. `?` converts any
/// error into it.
///
/// ```
/// use faultgate::failure::Raised;
///
/// async fn load() -> Result<String, Raised> {
///     let text = std::fs::read_to_string("/definitely/missing")?;
///     Ok(text)
/// }
/// ```
#[derive(Debug)]
pub struct Raised(Failure);

impl Raised {
    pub fn failure(&self) -> &Failure {
        &self.0
    }

    pub fn into_failure(self) -> Failure {
        self.0
    }
}

impl<E> From<E> for Raised
where
    E: Into<BoxError>,
{
    fn from(error: E) -> Self {
        Self(Failure::from_error(error.into()))
    }
}

#[derive(Clone)]
pub(crate) struct RaisedFailure(pub(crate) Failure);

fn carrying(failure: Failure) -> Response {
    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response.extensions_mut().insert(RaisedFailure(failure));
    response
}

impl IntoResponse for Raised {
    fn into_response(self) -> Response {
        carrying(self.0)
    }
}

impl IntoResponse for ErrorException {
    fn into_response(self) -> Response {
        carrying(Failure::from(self))
    }
}
