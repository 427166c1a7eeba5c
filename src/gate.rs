//! Route-access decisions for incoming navigation requests.
//!
//! The gate looks at exactly two facts: the request path and whether the
//! session context carries a credential. It never reads the credential's
//! value, performs no I/O and keeps no state between invocations, so the
//! same input always produces the same decision.

/// How a path relates to the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Reachable with or without a session.
    Public,
    /// Requires a session credential to be present.
    Protected,
    /// The login form; only shown to anonymous callers.
    AuthOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Continue,
    /// Same-origin redirect; the value is the replacement path.
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    protected_prefixes: Vec<String>,
    login_path: String,
    landing_path: String,
}

impl AccessGate {
    pub fn new(
        protected_prefixes: Vec<String>,
        login_path: String,
        landing_path: String,
    ) -> Self {
        Self {
            protected_prefixes,
            login_path,
            landing_path,
        }
    }

    /// Protected wins over auth-only wins over public; anything the table
    /// does not mention is public.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self
            .protected_prefixes
            .iter()
            .any(|prefix| path_is_under(path, prefix))
        {
            return RouteClass::Protected;
        }

        if path == self.login_path {
            return RouteClass::AuthOnly;
        }

        RouteClass::Public
    }

    pub fn decide(&self, path: &str, authenticated: bool) -> GateDecision {
        match self.classify(path) {
            RouteClass::Protected if !authenticated => {
                GateDecision::Redirect(self.login_path.clone())
            }
            RouteClass::AuthOnly if authenticated => {
                GateDecision::Redirect(self.landing_path.clone())
            }
            _ => GateDecision::Continue,
        }
    }
}

/// Prefix match that respects path segment boundaries: `/admin` covers
/// `/admin` and `/admin/users` but not `/adminx`.
pub(crate) fn path_is_under(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }

    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessGate, GateDecision, RouteClass, path_is_under};

    fn gate() -> AccessGate {
        AccessGate::new(
            vec!["/admin".into(), "/secretary".into(), "/me".into()],
            "/login".into(),
            "/me".into(),
        )
    }

    #[test]
    fn protected_prefixes_cover_all_sub_paths() {
        let gate = gate();
        for path in ["/admin", "/admin/users", "/admin/tools/debug", "/me", "/secretary/students"] {
            assert_eq!(gate.classify(path), RouteClass::Protected, "{path}");
        }
    }

    #[test]
    fn sibling_of_a_protected_prefix_is_public() {
        let gate = gate();
        assert_eq!(gate.classify("/adminx"), RouteClass::Public);
        assert_eq!(gate.classify("/secretaryship"), RouteClass::Public);
        assert_eq!(gate.classify("/men"), RouteClass::Public);
    }

    #[test]
    fn unknown_paths_are_public() {
        let gate = gate();
        assert_eq!(gate.classify("/about"), RouteClass::Public);
        assert_eq!(gate.classify("/apply/status"), RouteClass::Public);
        assert_eq!(gate.classify("/"), RouteClass::Public);
    }

    #[test]
    fn login_path_is_auth_only_exactly() {
        let gate = gate();
        assert_eq!(gate.classify("/login"), RouteClass::AuthOnly);
        assert_eq!(gate.classify("/login/reset"), RouteClass::Public);
    }

    #[test]
    fn anonymous_caller_is_sent_to_login_from_protected_paths() {
        let gate = gate();
        assert_eq!(
            gate.decide("/me", false),
            GateDecision::Redirect("/login".into())
        );
        assert_eq!(
            gate.decide("/admin/tools/debug", false),
            GateDecision::Redirect("/login".into())
        );
    }

    #[test]
    fn authenticated_caller_passes_protected_paths() {
        let gate = gate();
        assert_eq!(gate.decide("/secretary/students", true), GateDecision::Continue);
        assert_eq!(gate.decide("/admin", true), GateDecision::Continue);
    }

    #[test]
    fn authenticated_caller_is_bounced_off_the_login_form() {
        let gate = gate();
        assert_eq!(
            gate.decide("/login", true),
            GateDecision::Redirect("/me".into())
        );
    }

    #[test]
    fn anonymous_caller_sees_the_login_form() {
        assert_eq!(gate().decide("/login", false), GateDecision::Continue);
    }

    #[test]
    fn public_paths_never_redirect() {
        let gate = gate();
        for authenticated in [false, true] {
            assert_eq!(gate.decide("/about", authenticated), GateDecision::Continue);
            assert_eq!(gate.decide("/adminx", authenticated), GateDecision::Continue);
        }
    }

    #[test]
    fn decisions_are_stable_across_invocations() {
        let gate = gate();
        let first = gate.decide("/admin/users", false);
        let second = gate.decide("/admin/users", false);
        assert_eq!(first, second);
    }

    #[test]
    fn root_prefix_matches_everything() {
        assert!(path_is_under("/anything", "/"));
        assert!(path_is_under("/", "/"));
    }
}
