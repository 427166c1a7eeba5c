use anyhow::{Context, Result, anyhow};
use std::{env, net::SocketAddr};

#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub bind_addr: SocketAddr,
    pub gate: GateConfig,
    pub session_cookie: String,
    pub landing: LandingConfig,
    pub validation: ValidationConfig,
    pub upstreams: Vec<UpstreamConfig>,
    pub routes: Vec<RouteConfig>,
}

/// Static route-classification table. Fixed for the lifetime of the process;
/// a prefix missing from the table silently makes its pages public, so the
/// defaults mirror the deployed page tree.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub protected_prefixes: Vec<String>,
    pub login_path: String,
    pub landing_path: String,
}

#[derive(Debug, Clone)]
pub struct LandingConfig {
    /// Role name to home page, in precedence order.
    pub table: Vec<(String, String)>,
    /// Who-am-I endpoint as seen from the edge (resolved through the route
    /// table like any proxied request).
    pub profile_path: String,
}

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub max_body_bytes: usize,
    pub require_host_header: bool,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub name: String,
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub path_prefix: String,
    pub upstreams: Vec<String>,
}

impl EdgeConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .context("invalid BIND_ADDR")?;

        let gate = GateConfig {
            protected_prefixes: parse_paths("PROTECTED_PREFIXES", "/admin,/secretary,/me")?,
            login_path: parse_path("LOGIN_PATH", "/login")?,
            landing_path: parse_path("LANDING_PATH", "/me")?,
        };

        let session_cookie = env::var("SESSION_COOKIE").unwrap_or_else(|_| "access_token".into());
        if session_cookie.trim().is_empty() {
            return Err(anyhow!("SESSION_COOKIE must not be empty"));
        }

        let landing = LandingConfig {
            table: parse_landing_table(
                &env::var("LANDING_ROLES").unwrap_or_else(|_| {
                    "IT Support=/admin,Registrar/Secretary=/secretary".into()
                }),
            )?,
            profile_path: parse_path("PROFILE_PATH", "/api/users/me")?,
        };

        let validation = ValidationConfig {
            max_body_bytes: parse_env("MAX_BODY_BYTES", 1_048_576usize),
            require_host_header: parse_env("REQUIRE_HOST_HEADER", true),
        };

        let upstreams = parse_upstreams(&env::var("UPSTREAMS").unwrap_or_else(|_| {
            "backend=http://127.0.0.1:8000,frontend=http://127.0.0.1:3000".into()
        }))?;

        let routes = parse_routes(
            &env::var("ROUTES").unwrap_or_else(|_| "/api=backend,/=frontend".into()),
        )?;

        Ok(Self {
            bind_addr,
            gate,
            session_cookie,
            landing,
            validation,
            upstreams,
            routes,
        })
    }
}

fn parse_upstreams(raw: &str) -> Result<Vec<UpstreamConfig>> {
    let mut out = Vec::new();
    for chunk in raw.split(',').filter(|c| !c.trim().is_empty()) {
        let mut parts = chunk.splitn(2, '=');
        let name = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("invalid upstream entry: {chunk}"))?
            .to_string();
        let rhs = parts
            .next()
            .map(str::trim)
            .ok_or_else(|| anyhow!("invalid upstream entry: {chunk}"))?;

        let spec: Vec<&str> = rhs.split('@').collect();
        let base_url = spec
            .first()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("invalid upstream URL for {name}"))?;
        let timeout_ms = spec
            .get(1)
            .map(|s| s.parse::<u64>().context("invalid upstream timeout"))
            .transpose()?
            .unwrap_or(5_000)
            .max(100);

        out.push(UpstreamConfig {
            name,
            base_url,
            timeout_ms,
        });
    }

    if out.is_empty() {
        return Err(anyhow!("no upstreams configured"));
    }
    Ok(out)
}

fn parse_routes(raw: &str) -> Result<Vec<RouteConfig>> {
    let mut out = Vec::new();
    for chunk in raw.split(',').filter(|c| !c.trim().is_empty()) {
        let mut parts = chunk.splitn(2, '=');
        let path_prefix = parts
            .next()
            .map(str::trim)
            .filter(|s| s.starts_with('/'))
            .ok_or_else(|| anyhow!("invalid route entry: {chunk}"))?
            .to_string();

        let upstreams = parts
            .next()
            .map(str::trim)
            .ok_or_else(|| anyhow!("invalid route entry: {chunk}"))?
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        if upstreams.is_empty() {
            return Err(anyhow!("route has no upstreams: {chunk}"));
        }

        out.push(RouteConfig {
            path_prefix,
            upstreams,
        });
    }

    if out.is_empty() {
        return Err(anyhow!("no routes configured"));
    }
    Ok(out)
}

/// `role=path` pairs, comma separated. Order is kept: it is the precedence
/// order for users holding more than one mapped role.
fn parse_landing_table(raw: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for chunk in raw.split(',').filter(|c| !c.trim().is_empty()) {
        let mut parts = chunk.splitn(2, '=');
        let role = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("invalid landing entry: {chunk}"))?
            .to_string();
        let path = parts
            .next()
            .map(str::trim)
            .filter(|s| s.starts_with('/'))
            .ok_or_else(|| anyhow!("invalid landing path in: {chunk}"))?
            .to_string();

        out.push((role, path));
    }
    Ok(out)
}

fn parse_paths(key: &str, default: &str) -> Result<Vec<String>> {
    let paths = parse_csv(key, default);
    for path in &paths {
        if !path.starts_with('/') {
            return Err(anyhow!("{key} entries must start with '/': {path}"));
        }
    }
    Ok(paths)
}

fn parse_path(key: &str, default: &str) -> Result<String> {
    let path = env::var(key).unwrap_or_else(|_| default.to_string());
    let path = path.trim().to_string();
    if !path.starts_with('/') {
        return Err(anyhow!("{key} must start with '/': {path}"));
    }
    Ok(path)
}

fn parse_csv(key: &str, default: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::{parse_landing_table, parse_routes, parse_upstreams};

    #[test]
    fn landing_table_keeps_declaration_order() {
        let table =
            parse_landing_table("IT Support=/admin,Registrar/Secretary=/secretary").unwrap();
        assert_eq!(
            table,
            vec![
                ("IT Support".to_string(), "/admin".to_string()),
                ("Registrar/Secretary".to_string(), "/secretary".to_string()),
            ]
        );
    }

    #[test]
    fn landing_table_rejects_relative_paths() {
        assert!(parse_landing_table("Teacher=teacher").is_err());
    }

    #[test]
    fn routes_support_failover_lists() {
        let routes = parse_routes("/api=backend,/=frontend|backend").unwrap();
        assert_eq!(routes[1].upstreams, vec!["frontend", "backend"]);
    }

    #[test]
    fn upstream_timeout_is_clamped_to_a_floor() {
        let upstreams = parse_upstreams("backend=http://127.0.0.1:8000@1").unwrap();
        assert_eq!(upstreams[0].timeout_ms, 100);
    }
}
