//! Provider capability traits: the narrow, injected-at-construction seams
//! nauts calls out to for identity verification, policy storage, and account
//! lookup. Storage and identity backends themselves are out of scope; these
//! traits are the plumbing the controller needs to call.

pub mod router;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::model::{Account, PolicyRecord, User};

pub use router::ProviderRouter;

/// A request to verify a set of presented credentials against `account`.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    /// The account the connecting client claims.
    pub account: String,
    /// The opaque credential/token presented by the client.
    pub token: String,
}

/// Verifies connect credentials and returns the [`User`] they identify.
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Verify `request`, returning the identified user.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] with kind `InvalidCredentials` or
    /// `UserNotFound` on failure.
    async fn verify(&self, request: &VerifyRequest) -> Result<User, ProviderError>;

    /// The account patterns this provider is willing to authenticate for.
    /// Patterns are exact names, a `prefix*` glob, or the literal `"*"`
    /// (every non-reserved account).
    fn manageable_accounts(&self) -> Vec<String>;
}

/// Resolves the policies bound to a role.
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    /// Fetch every policy bound to `role` in `account`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] with kind `RoleNotFound` if the role has
    /// no bindings, or `PolicyNotFound` if a bound policy id doesn't resolve.
    async fn get_policies_for_role(
        &self,
        account: &str,
        role: &str,
    ) -> Result<Vec<PolicyRecord>, ProviderError>;
}

/// Resolves the signing [`Account`] a credential should be issued into.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Look up `account` by name.
    async fn lookup(&self, account: &str) -> Option<Arc<Account>>;
}
