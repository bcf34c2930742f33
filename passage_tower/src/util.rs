//! Utilities for generating HTTP responses when a navigation is gated

use http::{header, Response, StatusCode};

use crate::RedirectTarget;

/// Build a `307 Temporary Redirect` response pointing at `target`
///
/// The prepared response will have the form:
///
/// ```http
/// HTTP/1.1 307 Temporary Redirect
/// location: {target}
/// ```
///
/// The method and body of the original request are preserved by clients
/// following the redirect.
pub fn redirect<Body: Default>(target: &RedirectTarget) -> Response<Body> {
    let mut resp = Response::new(Body::default());
    *resp.status_mut() = StatusCode::TEMPORARY_REDIRECT;
    resp.headers_mut()
        .insert(header::LOCATION, target.header_value().clone());
    resp
}
