use async_trait::async_trait;

use crate::{
    config::ValidationConfig,
    context::RequestContext,
    error::{EdgeError, EdgeResult},
    middleware::{ControlFlow, EdgeMiddleware},
};

/// Screens out requests the proxy should never forward: missing Host,
/// payload/declared-length disagreement, oversized bodies, and paths that
/// could confuse an upstream's own routing.
pub struct RequestValidationMiddleware {
    cfg: ValidationConfig,
}

impl RequestValidationMiddleware {
    pub fn new(cfg: ValidationConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl EdgeMiddleware for RequestValidationMiddleware {
    fn name(&self) -> &'static str {
        "request-validation"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> EdgeResult<ControlFlow> {
        if self.cfg.require_host_header && !ctx.headers.contains_key("host") {
            return Err(EdgeError::Validation(
                "Missing required Host header".to_string(),
            ));
        }

        if let Some(reason) = path_rejection(ctx.uri.path()) {
            return Err(EdgeError::Validation(reason.to_string()));
        }

        if let Some(content_length) = ctx
            .headers
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            && content_length != ctx.body.len()
        {
            return Err(EdgeError::Validation(
                "content-length does not match payload size".to_string(),
            ));
        }

        if ctx.body.len() > self.cfg.max_body_bytes {
            return Err(EdgeError::PayloadTooLarge);
        }

        Ok(ControlFlow::Continue)
    }
}

fn path_rejection(path: &str) -> Option<&'static str> {
    if path.split('/').any(|segment| segment == "..") {
        return Some("Path must not contain parent-directory segments");
    }

    if path.chars().any(|c| c.is_ascii_control()) {
        return Some("Path must not contain control characters");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::path_rejection;

    #[test]
    fn dot_dot_segments_are_rejected() {
        assert!(path_rejection("/admin/../secretary").is_some());
        assert!(path_rejection("/..").is_some());
    }

    #[test]
    fn dotted_names_are_not_traversal() {
        assert!(path_rejection("/static/app..min.js").is_none());
        assert!(path_rejection("/admin/users").is_none());
    }
}
