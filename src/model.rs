//! Core data model: users, roles, accounts, and the wire/storage shapes a
//! [`crate::provider::PolicyProvider`] hands back to the policy compiler.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A role binding: a role name scoped to the account it was granted in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role {
    /// Account the role is bound in.
    pub account: String,
    /// Role name.
    pub name: String,
}

/// A user as returned by an [`crate::provider::AuthenticationProvider`],
/// before it has been scoped to the account it is connecting to.
#[derive(Debug, Clone)]
pub struct User {
    /// Stable user id.
    pub id: String,
    /// Every role granted to this user, across every account.
    pub roles: Vec<Role>,
    /// Free-form attributes usable in template interpolation.
    pub attributes: HashMap<String, String>,
}

/// A user narrowed to a single account: only the roles bound in that
/// account survive, and any role carrying a wildcard in either field is
/// dropped outright rather than partially matched.
#[derive(Debug, Clone)]
pub struct AccountScopedUser {
    /// Stable user id.
    pub id: String,
    /// The account this user is scoped to.
    pub account: String,
    /// Roles bound in `account`, with wildcard roles excluded.
    pub roles: Vec<Role>,
    /// Free-form attributes usable in template interpolation.
    pub attributes: HashMap<String, String>,
}

impl AccountScopedUser {
    /// Scope a verified [`User`] to `account`.
    #[must_use]
    pub fn scope(user: &User, account: &str) -> Self {
        let roles = user
            .roles
            .iter()
            .filter(|r| {
                r.account == account && !contains_wildcard(&r.account) && !contains_wildcard(&r.name)
            })
            .cloned()
            .collect();
        Self {
            id: user.id.clone(),
            account: account.to_string(),
            roles,
            attributes: user.attributes.clone(),
        }
    }
}

fn contains_wildcard(s: &str) -> bool {
    s.contains('*') || s.contains('>')
}

/// A single statement within a policy: an effect, the actions it grants, and
/// the resources those actions apply to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementRecord {
    /// `"allow"` is the only effect the compiler honors; anything else is
    /// skipped (deny rules are an explicit non-goal).
    pub effect: String,
    /// Raw action tokens, atomic or group (see [`crate::action`]).
    pub actions: Vec<String>,
    /// Raw resource strings, possibly templated (see [`crate::template`]).
    pub resources: Vec<String>,
}

/// A named, account-scoped policy: a set of statements a role binding can
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Policy id. A `_global:` prefix marks a policy usable from any account.
    pub id: String,
    /// The account this policy belongs to, or `"*"` for a global policy.
    pub account: String,
    /// Human-readable policy name.
    pub name: String,
    /// The statements this policy grants.
    pub statements: Vec<StatementRecord>,
}

/// A role-to-policy binding, as stored by a [`crate::provider::PolicyProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingRecord {
    /// Role name this binding applies to.
    pub role: String,
    /// Account the role is bound in.
    pub account: String,
    /// Policy ids bound to this role.
    pub policies: Vec<String>,
}

/// Split a policy id into `(is_global, bare_id)`, stripping a leading
/// `_global:` prefix if present.
#[must_use]
pub fn split_global_policy_id(id: &str) -> (bool, &str) {
    match id.strip_prefix("_global:") {
        Some(bare) => (true, bare),
        None => (false, id),
    }
}

/// A capability to sign bytes as a given NATS account, without exposing the
/// underlying key material. Implementations may refuse operations they
/// cannot support (e.g. a public-key-only signer refusing to sign).
pub trait Signer: Send + Sync {
    /// The public identity (nkey) this signer signs as.
    fn public_key(&self) -> String;

    /// Sign `data`, returning the raw signature bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if this signer has no private key material.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error>;
}

/// An account the credential signing adapter can issue users into.
pub struct Account {
    /// Account name, as referenced by policies and bindings.
    pub name: String,
    /// The account's public nkey.
    pub public_key: String,
    /// Capability used to sign user JWTs issued into this account.
    pub signer: Arc<dyn Signer>,
}
