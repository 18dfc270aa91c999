//! Authentication controller: the pipeline wiring the rest of the crate
//! together — parse the connect token, route to a provider, verify
//! credentials, scope the user to the requested account, compile every
//! bound role's policies, and sign the resulting credential.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::credential::CredentialIssuer;
use crate::error::{AuthError, ErrorKind, Phase};
use crate::context::RequestContext;
use crate::model::{AccountScopedUser, Role, User};
use crate::permission::{PermissionSet, SerializedPermissions};
use crate::policy;
use crate::provider::{AccountProvider, PolicyProvider, ProviderRouter, VerifyRequest};

/// The body of a NATS auth-callout connect token (the `connect_opts`
/// payload forwarded by the server), after nauts has decoded the envelope.
#[derive(Debug, Deserialize)]
pub struct ConnectToken {
    /// The account the client is connecting to.
    pub account: String,
    /// The opaque credential presented by the client.
    pub token: String,
    /// Optional explicit provider id (bypasses account-pattern routing).
    #[serde(default)]
    pub ap: Option<String>,
}

/// Inputs the controller needs beyond the connect token itself.
pub struct AuthRequest<'a> {
    /// The raw, still-JSON-encoded connect token.
    pub connect_token: &'a str,
    /// The public key the client presented for its ephemeral user identity,
    /// if any; one is generated if absent.
    pub caller_public_key: Option<String>,
    /// Requested credential lifetime in seconds; `0` means no expiry.
    pub ttl: u64,
    /// Wall-clock time to stamp the issued credential with.
    pub issued_at: u64,
}

/// The result of compiling a user's roles into a permission set, before and
/// after deduplication, plus any warnings collected along the way.
pub struct CompilationResult {
    /// Serialized permissions before [`PermissionSet::deduplicate`].
    pub pre_dedup: SerializedPermissions,
    /// Serialized permissions after deduplication — what gets signed.
    pub post_dedup: SerializedPermissions,
    /// Non-fatal warnings collected while compiling.
    pub warnings: Vec<String>,
    /// The roles that were compiled, in resolution order.
    pub roles: Vec<Role>,
}

/// The outcome of a full authentication pass: the resulting signed
/// credential plus everything that went into producing it.
pub struct AuthResult {
    /// The verified, unscoped user.
    pub user: User,
    /// The caller's public key (presented or generated).
    pub caller_public_key: String,
    /// Provider id that verified this user.
    pub provider_id: String,
    /// Compilation details.
    pub compilation: CompilationResult,
    /// The signed user JWT.
    pub credential: String,
    /// The signing account's public key, present only in
    /// [`crate::credential::IssuanceMode::Operator`] — the issuer the
    /// auth-callout response envelope's top-level `issuerAccount` should
    /// carry so the broker can verify the chain of trust back to the
    /// operator.
    pub issuer_account_public_key: Option<String>,
}

/// Wires the provider router, policy provider, account provider, and
/// credential issuer into the full authentication pipeline.
pub struct Controller {
    router: ProviderRouter,
    policies: Arc<dyn PolicyProvider>,
    accounts: Arc<dyn AccountProvider>,
    issuer: CredentialIssuer,
}

impl Controller {
    /// Build a controller from its collaborators.
    #[must_use]
    pub fn new(
        router: ProviderRouter,
        policies: Arc<dyn PolicyProvider>,
        accounts: Arc<dyn AccountProvider>,
        issuer: CredentialIssuer,
    ) -> Self {
        Self {
            router,
            policies,
            accounts,
            issuer,
        }
    }

    /// Run the full authentication pipeline for one connect attempt.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] tagged with the phase it failed in.
    pub async fn authenticate(&self, request: AuthRequest<'_>) -> Result<AuthResult, AuthError> {
        let token: ConnectToken = serde_json::from_str(request.connect_token).map_err(|e| {
            AuthError::new(ErrorKind::InvalidTokenType, Phase::Parse, None, "malformed connect token")
                .with_cause(e)
        })?;

        if token.token.is_empty() || token.account.is_empty() || contains_wildcard(&token.account) {
            return Err(AuthError::new(
                ErrorKind::InvalidAccount,
                Phase::Parse,
                None,
                "connect token has an empty or wildcarded account",
            ));
        }

        let (provider_id, provider) = self
            .router
            .select(&token.account, token.ap.as_deref())
            .map_err(|e| AuthError::from_provider(e, Phase::Route, None))?;

        let verify_request = VerifyRequest {
            account: token.account.clone(),
            token: token.token.clone(),
        };
        let user = provider
            .verify(&verify_request)
            .await
            .map_err(|e| AuthError::from_provider(e, Phase::Verify, None))?;

        let scoped = AccountScopedUser::scope(&user, &token.account);

        let roles = dedup_roles(&token.account, &scoped.roles);

        let base_ctx = RequestContext {
            user_id: scoped.id.clone(),
            user_account: scoped.account.clone(),
            user_attrs: scoped.attributes.clone(),
            role_name: String::new(),
            role_account: String::new(),
            account_id: token.account.clone(),
        };

        let mut set = PermissionSet::new();
        let mut warnings = Vec::new();
        let mut compiled_roles = Vec::new();

        for role in &roles {
            let ctx = base_ctx.with_role(&role.account, &role.name);
            match self.policies.get_policies_for_role(&role.account, &role.name).await {
                Ok(records) => {
                    warnings.extend(policy::compile(&records, &ctx, &mut set));
                    compiled_roles.push(role.clone());
                }
                Err(e) if e.kind == ErrorKind::RoleNotFound => {
                    warnings.push(format!("role not found: {}.{}", role.account, role.name));
                }
                Err(e) => {
                    return Err(AuthError::from_provider(e, Phase::Compile, Some(scoped.id.clone())));
                }
            }
        }

        let pre_dedup = set.serialize();
        set.deduplicate();
        let post_dedup = set.serialize();

        let caller_public_key = match request.caller_public_key {
            Some(key) if !key.is_empty() => key,
            _ => generate_ephemeral_user_key(),
        };

        let account = self.accounts.lookup(&token.account).await.ok_or_else(|| {
            AuthError::new(
                ErrorKind::InvalidAccount,
                Phase::Sign,
                Some(scoped.id.clone()),
                format!("no signing account registered for {}", token.account),
            )
        })?;

        let issuer_account_public_key = match self.issuer.mode() {
            crate::credential::IssuanceMode::Operator => Some(account.public_key.clone()),
            crate::credential::IssuanceMode::Static => None,
        };

        let credential = self
            .issuer
            .issue(
                &scoped.id,
                &caller_public_key,
                request.ttl,
                request.issued_at,
                &post_dedup,
                &account,
            )
            .map_err(|e| {
                AuthError::new(ErrorKind::Internal, Phase::Sign, Some(scoped.id.clone()), "failed to sign credential")
                    .with_cause(e)
            })?;

        Ok(AuthResult {
            user,
            caller_public_key,
            provider_id,
            compilation: CompilationResult {
                pre_dedup,
                post_dedup,
                warnings,
                roles: compiled_roles,
            },
            credential,
            issuer_account_public_key,
        })
    }
}

fn contains_wildcard(s: &str) -> bool {
    s.contains('*') || s.contains('>')
}

fn generate_ephemeral_user_key() -> String {
    nkeys::KeyPair::new_user().public_key()
}

/// Always include the requesting account's implicit `default` role first,
/// then the user's own roles for that account, deduplicated by
/// `(account, name)`.
fn dedup_roles(account: &str, user_roles: &[Role]) -> Vec<Role> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for role in std::iter::once(Role {
        account: account.to_string(),
        name: "default".to_string(),
    })
    .chain(user_roles.iter().cloned())
    {
        if seen.insert((role.account.clone(), role.name.clone())) {
            out.push(role);
        }
    }
    out
}
