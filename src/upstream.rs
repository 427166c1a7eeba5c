use axum::{body::Body, response::Response};
use http::{Uri, header, header::HeaderName};
use std::{collections::HashMap, time::Duration};

use crate::{
    config::{RouteConfig, UpstreamConfig},
    context::RequestContext,
    error::{EdgeError, EdgeResult},
    landing::Profile,
};

/// Named upstreams behind the edge, plus the shared HTTP client used to
/// reach them.
#[derive(Clone)]
pub struct UpstreamPool {
    client: reqwest::Client,
    services: HashMap<String, UpstreamConfig>,
}

impl UpstreamPool {
    pub fn new(upstreams: Vec<UpstreamConfig>) -> EdgeResult<Self> {
        let mut services = HashMap::new();
        for upstream in upstreams {
            services.insert(upstream.name.clone(), upstream);
        }

        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| EdgeError::Internal(e.to_string()))?;

        Ok(Self { client, services })
    }

    pub fn get(&self, name: &str) -> Option<UpstreamConfig> {
        self.services.get(name).cloned()
    }

    pub fn route_candidates(&self, route: &RouteConfig) -> Vec<UpstreamConfig> {
        route
            .upstreams
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    pub async fn forward(
        &self,
        ctx: &RequestContext,
        route: &RouteConfig,
        upstream: &UpstreamConfig,
    ) -> EdgeResult<Response<Body>> {
        let target_url = format!(
            "{}{}",
            upstream.base_url,
            mounted_path(&route.path_prefix, &ctx.uri)
        );

        let mut request = self
            .client
            .request(ctx.method.clone(), &target_url)
            .body(ctx.body.clone());

        for (name, value) in &ctx.headers {
            if should_forward_header(name) {
                request = request.header(name, value);
            }
        }

        request = request.header("x-request-id", ctx.request_id.clone());
        if let Some(client_ip) = ctx.client_ip {
            request = request.header("x-forwarded-for", client_ip.to_string());
        }

        let upstream_response = request
            .timeout(Duration::from_millis(upstream.timeout_ms))
            .send()
            .await
            .map_err(|err| EdgeError::Upstream(err.to_string()))?;

        let status = upstream_response.status();
        let headers = upstream_response.headers().clone();
        let body = upstream_response.bytes().await?;

        let mut builder = Response::builder().status(status);
        for (name, value) in &headers {
            if should_forward_header(name) {
                builder = builder.header(name, value);
            }
        }

        builder
            .body(Body::from(body))
            .map_err(|e| EdgeError::Internal(e.to_string()))
    }

    /// Who-am-I lookup on behalf of the landing resolver. The observed
    /// credential travels exactly as the caller presented it: cookie and
    /// authorization headers are forwarded, nothing is minted here.
    pub async fn fetch_profile(
        &self,
        ctx: &RequestContext,
        route: &RouteConfig,
        upstream: &UpstreamConfig,
        profile_path: &str,
    ) -> EdgeResult<Profile> {
        let profile_uri = profile_path
            .parse::<Uri>()
            .map_err(|e| EdgeError::Internal(e.to_string()))?;
        let target_url = format!(
            "{}{}",
            upstream.base_url,
            mounted_path(&route.path_prefix, &profile_uri)
        );

        let mut request = self.client.get(&target_url);
        for name in [header::COOKIE, header::AUTHORIZATION] {
            for value in ctx.headers.get_all(&name) {
                request = request.header(&name, value);
            }
        }
        request = request.header("x-request-id", ctx.request_id.clone());

        let response = request
            .timeout(Duration::from_millis(upstream.timeout_ms))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EdgeError::Upstream(format!(
                "profile lookup returned {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        serde_json::from_slice::<Profile>(&body)
            .map_err(|e| EdgeError::Upstream(format!("unparseable profile payload: {e}")))
    }
}

/// Path as the upstream sees it: the matched route prefix is stripped so
/// each upstream is addressed relative to its mount, and the query string is
/// kept. A route mounted at `/` forwards paths verbatim.
fn mounted_path(prefix: &str, uri: &Uri) -> String {
    let path = uri.path();

    let rest = if prefix == "/" {
        path
    } else {
        match path.strip_prefix(prefix) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    };

    match uri.query() {
        Some(query) => format!("{rest}?{query}"),
        None => rest.to_string(),
    }
}

fn should_forward_header(name: &HeaderName) -> bool {
    let lowercase = name.as_str().to_ascii_lowercase();
    !matches!(
        lowercase.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "host"
            | "content-length"
    )
}

#[cfg(test)]
mod tests {
    use http::Uri;

    use super::mounted_path;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn api_prefix_is_stripped_for_the_backend() {
        assert_eq!(mounted_path("/api", &uri("/api/users/me")), "/users/me");
        assert_eq!(mounted_path("/api", &uri("/api")), "/");
    }

    #[test]
    fn root_mount_forwards_paths_verbatim() {
        assert_eq!(mounted_path("/", &uri("/me")), "/me");
        assert_eq!(mounted_path("/", &uri("/")), "/");
    }

    #[test]
    fn query_string_survives_the_rewrite() {
        assert_eq!(
            mounted_path("/api", &uri("/api/students?page=2&q=jo")),
            "/students?page=2&q=jo"
        );
    }
}
