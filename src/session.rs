use http::{HeaderMap, header};

/// Per-request view of the caller's session, built once from the incoming
/// headers and threaded through the request context.
///
/// The credential is opaque here: nothing in the gateway parses or validates
/// it. A stale or garbage token still counts as a session for routing, and
/// the backend rejects it on the first proxied call.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    credential: Option<String>,
}

impl SessionContext {
    /// Reads the named session cookie, falling back to a bearer token in the
    /// `Authorization` header. The backend accepts either, so the gateway
    /// observes either.
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        let credential = cookie_value(headers, cookie_name).or_else(|| bearer_token(headers));
        Self { credential }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for raw in headers.get_all(header::COOKIE) {
        let Ok(raw) = raw.to_str() else { continue };

        for pair in raw.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            if parts.next() != Some(name) {
                continue;
            }
            if let Some(value) = parts.next().filter(|v| !v.is_empty()) {
                return Some(value.to_string());
            }
        }
    }

    None
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
}
