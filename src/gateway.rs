use std::{net::IpAddr, sync::Arc};

use axum::{
    body::{Body, to_bytes},
    http::{HeaderName, HeaderValue, Method, Request},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    config::{EdgeConfig, RouteConfig},
    context::RequestContext,
    error::{EdgeError, EdgeResult},
    gate::{AccessGate, path_is_under},
    landing::LandingTable,
    middleware::{
        ControlFlow, EdgeMiddleware,
        access_gate::{AccessGateMiddleware, redirect_response},
        logging::RequestLoggingMiddleware,
        validation::RequestValidationMiddleware,
    },
    session::SessionContext,
    upstream::UpstreamPool,
};

pub struct Gateway {
    middlewares: Vec<Arc<dyn EdgeMiddleware>>,
    routes: Vec<RouteConfig>,
    upstream_pool: Arc<UpstreamPool>,
    session_cookie: String,
    landing_path: String,
    profile_path: String,
    landing: LandingTable,
    max_body_bytes: usize,
}

impl Gateway {
    pub fn from_config(config: EdgeConfig) -> EdgeResult<Self> {
        let gate = AccessGate::new(
            config.gate.protected_prefixes.clone(),
            config.gate.login_path.clone(),
            config.gate.landing_path.clone(),
        );

        let middlewares: Vec<Arc<dyn EdgeMiddleware>> = vec![
            Arc::new(RequestLoggingMiddleware),
            Arc::new(RequestValidationMiddleware::new(config.validation.clone())),
            Arc::new(AccessGateMiddleware::new(gate)),
        ];

        let upstream_pool = Arc::new(UpstreamPool::new(config.upstreams)?);
        let landing = LandingTable::new(config.landing.table, config.gate.landing_path.clone());

        Ok(Self {
            middlewares,
            routes: config.routes,
            upstream_pool,
            session_cookie: config.session_cookie,
            landing_path: config.gate.landing_path,
            profile_path: config.landing.profile_path,
            landing,
            max_body_bytes: config.validation.max_body_bytes,
        })
    }

    pub async fn handle_http(
        &self,
        request: Request<Body>,
        client_ip: Option<IpAddr>,
    ) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let max_capture = self.max_body_bytes.saturating_add(1);
        let body = match to_bytes(body, max_capture).await {
            Ok(body) => body,
            Err(_) => {
                let mut response = EdgeError::PayloadTooLarge.into_response();
                self.attach_hardening_headers("unknown", &mut response);
                return response;
            }
        };

        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let session = SessionContext::from_headers(&parts.headers, &self.session_cookie);

        let mut ctx = RequestContext::new(
            request_id,
            parts.method,
            parts.uri,
            parts.headers,
            body,
            client_ip,
            session,
        );

        let mut executed = Vec::new();

        for (idx, middleware) in self.middlewares.iter().enumerate() {
            match middleware.on_request(&mut ctx).await {
                Ok(ControlFlow::Continue) => executed.push(idx),
                Ok(ControlFlow::ShortCircuit(mut response)) => {
                    self.apply_response_middlewares(&executed, &ctx, &mut response)
                        .await;
                    self.attach_hardening_headers(&ctx.request_id, &mut response);
                    return response;
                }
                Err(err) => {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        middleware = middleware.name(),
                        error = %err,
                        "middleware rejected request"
                    );
                    let mut response = err.into_response();
                    self.apply_response_middlewares(&executed, &ctx, &mut response)
                        .await;
                    self.attach_hardening_headers(&ctx.request_id, &mut response);
                    return response;
                }
            }
        }

        // The landing page itself picks a role-specific home page when it
        // can. Best effort: any failure falls through to the proxy and the
        // generic page renders as usual.
        if ctx.method == Method::GET
            && ctx.uri.path() == self.landing_path
            && ctx.session.is_authenticated()
            && let Some(target) = self.resolve_landing(&ctx).await
        {
            match redirect_response(&ctx.uri, &target) {
                Ok(mut response) => {
                    self.apply_response_middlewares(&executed, &ctx, &mut response)
                        .await;
                    self.attach_hardening_headers(&ctx.request_id, &mut response);
                    return response;
                }
                Err(err) => {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        error = %err,
                        "failed to build landing redirect"
                    );
                }
            }
        }

        let route = match self.resolve_route(ctx.uri.path()) {
            Some(route) => route,
            None => {
                let mut response = EdgeError::RouteNotFound.into_response();
                self.apply_response_middlewares(&executed, &ctx, &mut response)
                    .await;
                self.attach_hardening_headers(&ctx.request_id, &mut response);
                return response;
            }
        };

        let candidates = self.upstream_pool.route_candidates(&route);
        if candidates.is_empty() {
            let mut response = EdgeError::UpstreamUnavailable.into_response();
            self.apply_response_middlewares(&executed, &ctx, &mut response)
                .await;
            self.attach_hardening_headers(&ctx.request_id, &mut response);
            return response;
        }

        ctx.route = Some(route.clone());

        let mut last_error: Option<EdgeError> = None;

        for upstream in &candidates {
            ctx.chosen_upstream = Some(upstream.name.clone());

            match self.upstream_pool.forward(&ctx, &route, upstream).await {
                Ok(mut response) => {
                    self.apply_response_middlewares(&executed, &ctx, &mut response)
                        .await;
                    self.attach_hardening_headers(&ctx.request_id, &mut response);
                    return response;
                }
                Err(err) => {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        upstream = %upstream.name,
                        error = %err,
                        "upstream call failed; trying next candidate"
                    );
                    last_error = Some(err);
                }
            }
        }

        let mut response = last_error
            .unwrap_or(EdgeError::UpstreamUnavailable)
            .into_response();
        self.apply_response_middlewares(&executed, &ctx, &mut response)
            .await;
        self.attach_hardening_headers(&ctx.request_id, &mut response);
        response
    }

    async fn resolve_landing(&self, ctx: &RequestContext) -> Option<String> {
        let route = self.resolve_route(&self.profile_path)?;
        let upstream = route
            .upstreams
            .first()
            .and_then(|name| self.upstream_pool.get(name))?;

        match self
            .upstream_pool
            .fetch_profile(ctx, &route, &upstream, &self.profile_path)
            .await
        {
            Ok(profile) => self.landing.resolve(&profile.roles).map(ToString::to_string),
            Err(err) => {
                tracing::debug!(
                    request_id = %ctx.request_id,
                    error = %err,
                    "profile lookup failed; staying on the landing page"
                );
                None
            }
        }
    }

    fn resolve_route(&self, path: &str) -> Option<RouteConfig> {
        self.routes
            .iter()
            .filter(|route| path_is_under(path, &route.path_prefix))
            .max_by_key(|route| route.path_prefix.len())
            .cloned()
    }

    async fn apply_response_middlewares(
        &self,
        executed: &[usize],
        ctx: &RequestContext,
        response: &mut Response<Body>,
    ) {
        for idx in executed.iter().rev() {
            let middleware = &self.middlewares[*idx];
            if let Err(err) = middleware.on_response(ctx, response).await {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    middleware = middleware.name(),
                    error = %err,
                    "middleware post-response hook failed"
                );
            }
        }
    }

    fn attach_hardening_headers(&self, request_id: &str, response: &mut Response<Body>) {
        if let Ok(value) = HeaderValue::from_str(request_id) {
            response
                .headers_mut()
                .insert(HeaderName::from_static("x-request-id"), value);
        }

        response.headers_mut().insert(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        );
        response.headers_mut().insert(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        );
        response.headers_mut().insert(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("no-referrer"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::Gateway;
    use crate::config::{
        EdgeConfig, GateConfig, LandingConfig, RouteConfig, UpstreamConfig, ValidationConfig,
    };

    fn gateway() -> Gateway {
        Gateway::from_config(EdgeConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            gate: GateConfig {
                protected_prefixes: vec!["/admin".into(), "/secretary".into(), "/me".into()],
                login_path: "/login".into(),
                landing_path: "/me".into(),
            },
            session_cookie: "access_token".into(),
            landing: LandingConfig {
                table: vec![("IT Support".into(), "/admin".into())],
                profile_path: "/api/users/me".into(),
            },
            validation: ValidationConfig {
                max_body_bytes: 1024,
                require_host_header: true,
            },
            upstreams: vec![
                UpstreamConfig {
                    name: "backend".into(),
                    base_url: "http://127.0.0.1:8000".into(),
                    timeout_ms: 1000,
                },
                UpstreamConfig {
                    name: "frontend".into(),
                    base_url: "http://127.0.0.1:3000".into(),
                    timeout_ms: 1000,
                },
            ],
            routes: vec![
                RouteConfig {
                    path_prefix: "/api".into(),
                    upstreams: vec!["backend".into()],
                },
                RouteConfig {
                    path_prefix: "/".into(),
                    upstreams: vec!["frontend".into()],
                },
            ],
        })
        .unwrap()
    }

    #[test]
    fn longest_matching_prefix_wins() {
        let gateway = gateway();
        let route = gateway.resolve_route("/api/users/me").unwrap();
        assert_eq!(route.path_prefix, "/api");
        let route = gateway.resolve_route("/me").unwrap();
        assert_eq!(route.path_prefix, "/");
    }

    #[test]
    fn route_prefixes_respect_segment_boundaries() {
        let gateway = gateway();
        let route = gateway.resolve_route("/apidocs").unwrap();
        assert_eq!(route.path_prefix, "/");
    }

    #[test]
    fn profile_path_resolves_to_the_backend_route() {
        let gateway = gateway();
        let route = gateway.resolve_route(&gateway.profile_path).unwrap();
        assert_eq!(route.upstreams, vec!["backend"]);
    }
}
