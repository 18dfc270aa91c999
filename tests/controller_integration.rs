//! End-to-end authentication pipeline tests
//!
//! Exercises `Controller::authenticate` against in-process fakes standing in
//! for `AuthenticationProvider`, `PolicyProvider`, and `AccountProvider` -
//! the storage and identity backends themselves remain out of scope.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nauts::controller::{AuthRequest, Controller};
use nauts::credential::{CredentialIssuer, IssuanceMode};
use nauts::error::{Error, ErrorKind, ProviderError};
use nauts::model::{Account, BindingRecord, PolicyRecord, Role, Signer, StatementRecord, User};
use nauts::provider::{
    AccountProvider, AuthenticationProvider, PolicyProvider, ProviderRouter, VerifyRequest,
};

struct FixedSigner {
    public: String,
}

impl Signer for FixedSigner {
    fn public_key(&self) -> String {
        self.public.clone()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(data.iter().rev().copied().collect())
    }
}

struct StaticAuthProvider {
    users: HashMap<String, User>,
}

#[async_trait]
impl AuthenticationProvider for StaticAuthProvider {
    async fn verify(&self, request: &VerifyRequest) -> Result<User, ProviderError> {
        self.users
            .get(&request.token)
            .cloned()
            .ok_or_else(|| ProviderError::new(ErrorKind::InvalidCredentials, "unknown token"))
    }

    fn manageable_accounts(&self) -> Vec<String> {
        vec!["*".to_string()]
    }
}

struct InMemoryPolicyProvider {
    bindings: Vec<BindingRecord>,
    policies: HashMap<String, PolicyRecord>,
}

#[async_trait]
impl PolicyProvider for InMemoryPolicyProvider {
    async fn get_policies_for_role(
        &self,
        account: &str,
        role: &str,
    ) -> Result<Vec<PolicyRecord>, ProviderError> {
        let binding = self
            .bindings
            .iter()
            .find(|b| b.account == account && b.role == role)
            .ok_or_else(|| ProviderError::new(ErrorKind::RoleNotFound, "no binding"))?;

        binding
            .policies
            .iter()
            .map(|id| {
                self.policies
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ProviderError::new(ErrorKind::PolicyNotFound, format!("unknown policy: {id}")))
            })
            .collect()
    }
}

struct StaticAccountProvider {
    accounts: HashMap<String, Arc<Account>>,
}

#[async_trait]
impl AccountProvider for StaticAccountProvider {
    async fn lookup(&self, account: &str) -> Option<Arc<Account>> {
        self.accounts.get(account).cloned()
    }
}

fn acme_user() -> User {
    User {
        id: "alice".to_string(),
        roles: vec![Role {
            account: "ACME".to_string(),
            name: "reader".to_string(),
        }],
        attributes: HashMap::new(),
    }
}

fn controller() -> Controller {
    let mut users = HashMap::new();
    users.insert("good-token".to_string(), acme_user());

    let auth: Arc<dyn AuthenticationProvider> = Arc::new(StaticAuthProvider { users });
    let router = ProviderRouter::new(vec![("default".to_string(), auth)]).unwrap();

    let mut policies = HashMap::new();
    policies.insert(
        "read-orders".to_string(),
        PolicyRecord {
            id: "read-orders".to_string(),
            account: "ACME".to_string(),
            name: "read orders".to_string(),
            statements: vec![StatementRecord {
                effect: "allow".to_string(),
                actions: vec!["msg.sub".to_string()],
                resources: vec!["msg:orders.>".to_string()],
            }],
        },
    );
    let policy_provider = InMemoryPolicyProvider {
        bindings: vec![BindingRecord {
            role: "reader".to_string(),
            account: "ACME".to_string(),
            policies: vec!["read-orders".to_string()],
        }],
        policies,
    };

    let mut accounts = HashMap::new();
    accounts.insert(
        "ACME".to_string(),
        Arc::new(Account {
            name: "ACME".to_string(),
            public_key: "ACCTPUBKEY".to_string(),
            signer: Arc::new(FixedSigner {
                public: "AACCTSIGN".to_string(),
            }),
        }),
    );
    let account_provider = StaticAccountProvider { accounts };

    Controller::new(
        router,
        Arc::new(policy_provider),
        Arc::new(account_provider),
        CredentialIssuer::new(IssuanceMode::Static),
    )
}

fn connect_token(account: &str, token: &str) -> String {
    format!(r#"{{"account":"{account}","token":"{token}"}}"#)
}

#[tokio::test]
async fn valid_credentials_yield_a_signed_jwt_with_compiled_permissions() {
    let result = controller()
        .authenticate(AuthRequest {
            connect_token: &connect_token("ACME", "good-token"),
            caller_public_key: Some("UALICEKEY".to_string()),
            ttl: 3600,
            issued_at: 1_700_000_000,
        })
        .await
        .unwrap();

    assert_eq!(result.user.id, "alice");
    assert_eq!(result.provider_id, "default");
    assert_eq!(result.caller_public_key, "UALICEKEY");
    assert!(result.credential.split('.').count() == 3);
    assert!(result
        .compilation
        .post_dedup
        .subscribe
        .allow
        .iter()
        .any(|s| s == "orders.>"));
    // The implicit default role's inbox grant is always present alongside
    // whatever the explicit role compiled.
    assert!(result
        .compilation
        .post_dedup
        .subscribe
        .allow
        .iter()
        .any(|s| s.starts_with("_INBOX_")));
}

#[tokio::test]
async fn unknown_token_fails_at_verify_phase() {
    let err = controller()
        .authenticate(AuthRequest {
            connect_token: &connect_token("ACME", "bad-token"),
            caller_public_key: None,
            ttl: 0,
            issued_at: 1_700_000_000,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidCredentials);
    assert_eq!(err.phase, nauts::error::Phase::Verify);
}

#[tokio::test]
async fn missing_caller_public_key_gets_an_ephemeral_one() {
    let result = controller()
        .authenticate(AuthRequest {
            connect_token: &connect_token("ACME", "good-token"),
            caller_public_key: None,
            ttl: 0,
            issued_at: 1_700_000_000,
        })
        .await
        .unwrap();

    assert!(!result.caller_public_key.is_empty());
    assert!(result.caller_public_key.starts_with('U'));
}

#[tokio::test]
async fn wildcarded_account_is_rejected_before_routing() {
    let err = controller()
        .authenticate(AuthRequest {
            connect_token: &connect_token("ACME*", "good-token"),
            caller_public_key: None,
            ttl: 0,
            issued_at: 1_700_000_000,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidAccount);
    assert_eq!(err.phase, nauts::error::Phase::Parse);
}
