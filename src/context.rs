use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use std::{net::IpAddr, time::Instant};

use crate::{config::RouteConfig, session::SessionContext};

/// Everything the middleware chain and the proxy need to know about one
/// request. Built once per request and owned by the handler; nothing here is
/// shared between requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: Option<IpAddr>,
    pub started_at: Instant,
    pub session: SessionContext,
    pub route: Option<RouteConfig>,
    pub chosen_upstream: Option<String>,
}

impl RequestContext {
    pub fn new(
        request_id: String,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        client_ip: Option<IpAddr>,
        session: SessionContext,
    ) -> Self {
        Self {
            request_id,
            method,
            uri,
            headers,
            body,
            client_ip,
            started_at: Instant::now(),
            session,
            route: None,
            chosen_upstream: None,
        }
    }
}
