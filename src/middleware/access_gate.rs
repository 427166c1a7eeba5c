use async_trait::async_trait;
use axum::{
    body::Body,
    http::{StatusCode, Uri, header, uri::PathAndQuery},
    response::Response,
};

use crate::{
    context::RequestContext,
    error::{EdgeError, EdgeResult},
    gate::{AccessGate, GateDecision},
    middleware::{ControlFlow, EdgeMiddleware},
};

/// Runs the access gate against every request before any routing work. A
/// redirect decision short-circuits the chain; everything else passes
/// through untouched.
pub struct AccessGateMiddleware {
    gate: AccessGate,
}

impl AccessGateMiddleware {
    pub fn new(gate: AccessGate) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl EdgeMiddleware for AccessGateMiddleware {
    fn name(&self) -> &'static str {
        "access-gate"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> EdgeResult<ControlFlow> {
        match self
            .gate
            .decide(ctx.uri.path(), ctx.session.is_authenticated())
        {
            GateDecision::Continue => Ok(ControlFlow::Continue),
            GateDecision::Redirect(path) => {
                Ok(ControlFlow::ShortCircuit(redirect_response(&ctx.uri, &path)?))
            }
        }
    }
}

/// Replaces only the path-and-query component of the request URI. Scheme and
/// authority, when the request carries them, survive untouched so the
/// redirect stays on the same origin; origin-form requests get a path-only
/// `Location`, which the client resolves against the origin it already used.
pub fn redirect_target(original: &Uri, path: &str) -> EdgeResult<Uri> {
    let mut parts = original.clone().into_parts();
    parts.path_and_query =
        Some(PathAndQuery::try_from(path).map_err(|e| EdgeError::Internal(e.to_string()))?);
    Uri::from_parts(parts).map_err(|e| EdgeError::Internal(e.to_string()))
}

pub fn redirect_response(original: &Uri, path: &str) -> EdgeResult<Response<Body>> {
    let location = redirect_target(original, path)?;

    Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .header(header::LOCATION, location.to_string())
        .body(Body::empty())
        .map_err(|e| EdgeError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use axum::http::{Uri, header};

    use super::{redirect_response, redirect_target};

    #[test]
    fn absolute_uri_keeps_scheme_and_authority() {
        let original: Uri = "https://host:1234/admin/users".parse().unwrap();
        let target = redirect_target(&original, "/login").unwrap();
        assert_eq!(target.to_string(), "https://host:1234/login");
    }

    #[test]
    fn plain_http_origin_is_not_upgraded() {
        let original: Uri = "http://school.example/me".parse().unwrap();
        let target = redirect_target(&original, "/login").unwrap();
        assert_eq!(target.to_string(), "http://school.example/login");
    }

    #[test]
    fn query_string_of_the_original_request_is_dropped() {
        let original: Uri = "https://host/admin/users?page=2".parse().unwrap();
        let target = redirect_target(&original, "/login").unwrap();
        assert_eq!(target.to_string(), "https://host/login");
    }

    #[test]
    fn origin_form_request_gets_a_path_only_location() {
        let original: Uri = "/admin/users".parse().unwrap();
        let target = redirect_target(&original, "/login").unwrap();
        assert_eq!(target.to_string(), "/login");
    }

    #[test]
    fn redirect_response_is_a_temporary_redirect() {
        let original: Uri = "https://host:1234/login".parse().unwrap();
        let response = redirect_response(&original, "/me").unwrap();
        assert_eq!(response.status(), 307);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://host:1234/me"
        );
    }
}
