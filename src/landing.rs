use serde::Deserialize;

/// Shape of the backend's who-am-I response; everything but the role list is
/// ignored here.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Ordered role-to-home-page table. Table order is precedence: for a user
/// holding several mapped roles, the first entry that matches wins.
#[derive(Debug, Clone)]
pub struct LandingTable {
    entries: Vec<(String, String)>,
    landing_path: String,
}

impl LandingTable {
    pub fn new(entries: Vec<(String, String)>, landing_path: String) -> Self {
        Self {
            entries,
            landing_path,
        }
    }

    /// Role-specific home page for this set of roles, or `None` when the
    /// caller should stay on the generic landing page. An entry that points
    /// back at the landing page itself is treated as no destination, so the
    /// table cannot produce a redirect loop.
    pub fn resolve(&self, roles: &[String]) -> Option<&str> {
        self.entries
            .iter()
            .find(|(role, _)| roles.iter().any(|held| held == role))
            .map(|(_, path)| path.as_str())
            .filter(|path| *path != self.landing_path)
    }
}
