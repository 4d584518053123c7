use std::collections::HashSet;

use wor_core::AdminCapability;

/// Administrator capability backed by a fixed list of user ids.
#[derive(Debug, Clone, Default)]
pub struct StaticAdmins {
    admins: HashSet<String>,
}

impl StaticAdmins {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            admins: admins
                .into_iter()
                .map(|a| a.as_ref().trim().to_ascii_lowercase())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }
}

impl AdminCapability for StaticAdmins {
    fn is_administrator(&self, user_id: &str) -> bool {
        self.admins.contains(&user_id.trim().to_ascii_lowercase())
    }
}
