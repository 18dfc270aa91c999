//! Request context: the closed set of paths template interpolation (§
//! [`crate::template`]) and policy compilation can read. Built once per
//! authentication and cloned with a role override per role being compiled.

use std::collections::HashMap;

/// Read-only view over the authenticated user, the role currently being
/// compiled, and the account the session is scoped to.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The authenticated user's id.
    pub user_id: String,
    /// The account the user was scoped to.
    pub user_account: String,
    /// Free-form user attributes, addressable as `user.attr.<key>`.
    pub user_attrs: HashMap<String, String>,
    /// The role currently being compiled.
    pub role_name: String,
    /// The account the current role is bound in.
    pub role_account: String,
    /// The account the whole request is scoped to (`account.id`).
    pub account_id: String,
}

impl RequestContext {
    /// Resolve a dot-delimited path against the closed accessor set:
    /// `user.id`, `user.account`, `user.attr.<key>`, `role.name`,
    /// `role.account`, `account.id`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<String> {
        let mut parts = path.splitn(2, '.');
        let root = parts.next()?;
        let rest = parts.next()?;
        match (root, rest) {
            ("user", "id") => Some(self.user_id.clone()),
            ("user", "account") => Some(self.user_account.clone()),
            ("user", rest) => rest
                .strip_prefix("attr.")
                .and_then(|key| self.user_attrs.get(key))
                .cloned(),
            ("role", "name") => Some(self.role_name.clone()),
            ("role", "account") => Some(self.role_account.clone()),
            ("account", "id") => Some(self.account_id.clone()),
            _ => None,
        }
    }

    /// Clone this context with `role.name`/`role.account` overridden, without
    /// mutating the original.
    #[must_use]
    pub fn with_role(&self, account: &str, name: &str) -> Self {
        Self {
            role_name: name.to_string(),
            role_account: account.to_string(),
            ..self.clone()
        }
    }
}
