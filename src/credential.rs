//! Credential signing adapter: turns a compiled [`SerializedPermissions`]
//! into a signed NATS user JWT, in either static (`aud`-targeted) or
//! operator (`issuer_account`-targeted) issuance mode.
//!
//! The JWT envelope follows the NATS JWT v2 wire convention used across the
//! ecosystem (`header.payload.signature`, `ed25519-nkey` alg, NUID-derived
//! `jti`) — the same convention `nats-jwt-rs`'s own claim types serialize to
//! (see that crate's use for the callout envelope in [`crate::callout`]).
//! User claims are nauts's own typed struct rather than `nats-jwt-rs`'s
//! generic one, since the payload nauts signs is the [`SerializedPermissions`]
//! shape from [`crate::permission`], not a generic permission set.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;

use crate::error::Error;
use crate::model::{Account, Signer};
use crate::permission::SerializedPermissions;

/// Capability-backed [`Signer`] over an `nkeys` ed25519 keypair.
pub struct NkeySigner(nkeys::KeyPair);

impl NkeySigner {
    /// Build a signer from an nkey seed (`SA...`, `SU...`, etc).
    ///
    /// # Errors
    ///
    /// Returns an error if the seed is malformed.
    pub fn from_seed(seed: &str) -> Result<Self, Error> {
        let kp = nkeys::KeyPair::from_seed(seed).map_err(|e| Error::Signing(e.to_string()))?;
        Ok(Self(kp))
    }
}

impl Signer for NkeySigner {
    fn public_key(&self) -> String {
        self.0.public_key()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.0.sign(data).map_err(|e| Error::Signing(e.to_string()))
    }
}

/// Which identifier binds the issued user JWT to its account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceMode {
    /// Static mode: the account name is carried in `aud`. Used when the
    /// broker resolves accounts by name rather than by public key.
    Static,
    /// Operator mode: the account's public key is carried as
    /// `issuer_account`, letting the broker verify the chain of trust back
    /// to the operator.
    Operator,
}

#[derive(Debug, Serialize)]
struct JwtHeader {
    typ: &'static str,
    alg: &'static str,
}

#[derive(Debug, Serialize)]
struct UserClaims<'a> {
    jti: String,
    iat: u64,
    iss: String,
    name: &'a str,
    sub: &'a str,
    nats: UserClaimsBody<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aud: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

#[derive(Debug, Serialize)]
struct UserClaimsBody<'a> {
    #[serde(rename = "type")]
    claim_type: &'static str,
    version: u8,
    permissions: &'a SerializedPermissions,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer_account: Option<&'a str>,
}

/// Issues signed user credentials for a compiled permission set.
pub struct CredentialIssuer {
    mode: IssuanceMode,
}

impl CredentialIssuer {
    /// Build an issuer operating in `mode`.
    #[must_use]
    pub fn new(mode: IssuanceMode) -> Self {
        Self { mode }
    }

    /// The issuance mode this issuer operates in.
    #[must_use]
    pub fn mode(&self) -> IssuanceMode {
        self.mode
    }

    /// Issue a signed user JWT for `user_name`/`user_public_key`, granting
    /// `permissions`, expiring after `ttl_secs` (0 = no expiry), issued by
    /// `account`.
    ///
    /// # Errors
    ///
    /// Returns an error if the account's signer cannot sign (e.g. it only
    /// holds a public key).
    pub fn issue(
        &self,
        user_name: &str,
        user_public_key: &str,
        ttl_secs: u64,
        issued_at: u64,
        permissions: &SerializedPermissions,
        account: &Account,
    ) -> Result<String, Error> {
        let (aud, issuer_account) = match self.mode {
            IssuanceMode::Static => (Some(account.name.as_str()), None),
            IssuanceMode::Operator => (None, Some(account.public_key.as_str())),
        };

        let claims = UserClaims {
            jti: nuid::next(),
            iat: issued_at,
            iss: account.signer.public_key(),
            name: user_name,
            sub: user_public_key,
            nats: UserClaimsBody {
                claim_type: "user",
                version: 2,
                permissions,
                issuer_account,
            },
            aud,
            exp: (ttl_secs > 0).then(|| issued_at + ttl_secs),
        };

        encode_claims(&claims, account.signer.as_ref())
    }
}

fn encode_claims<T: Serialize>(payload: &T, signer: &dyn Signer) -> Result<String, Error> {
    let header = JwtHeader {
        typ: "jwt",
        alg: "ed25519-nkey",
    };
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = signer.sign(signing_input.as_bytes())?;
    let signature_b64 = URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{signing_input}.{signature_b64}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PermissionSet;
    use std::sync::Arc;

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

    fn account(mode_key: &str) -> Account {
        Account {
            name: "ACME".to_string(),
            public_key: "ACCTPUBKEY".to_string(),
            signer: Arc::new(FixedSigner {
                public: mode_key.to_string(),
            }),
        }
    }

    #[test]
    fn static_mode_sets_aud_not_issuer_account() {
        let issuer = CredentialIssuer::new(IssuanceMode::Static);
        let permissions = PermissionSet::new().serialize();
        let jwt = issuer
            .issue("alice", "UALICE", 0, 1_700_000_000, &permissions, &account("AACCT"))
            .unwrap();
        let parts: Vec<&str> = jwt.split('.').collect();
        assert_eq!(parts.len(), 3);
        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(payload["aud"], "ACME");
        assert!(payload["nats"]["issuer_account"].is_null());
    }

    #[test]
    fn operator_mode_sets_issuer_account_not_aud() {
        let issuer = CredentialIssuer::new(IssuanceMode::Operator);
        let permissions = PermissionSet::new().serialize();
        let jwt = issuer
            .issue("alice", "UALICE", 0, 1_700_000_000, &permissions, &account("AACCT"))
            .unwrap();
        let parts: Vec<&str> = jwt.split('.').collect();
        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert!(payload["aud"].is_null());
        assert_eq!(payload["nats"]["issuer_account"], "ACCTPUBKEY");
    }

    #[test]
    fn zero_ttl_omits_expiry() {
        let issuer = CredentialIssuer::new(IssuanceMode::Static);
        let permissions = PermissionSet::new().serialize();
        let jwt = issuer
            .issue("alice", "UALICE", 0, 1_700_000_000, &permissions, &account("AACCT"))
            .unwrap();
        let parts: Vec<&str> = jwt.split('.').collect();
        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert!(payload["exp"].is_null());
    }

    #[test]
    fn nonzero_ttl_sets_expiry_relative_to_issued_at() {
        let issuer = CredentialIssuer::new(IssuanceMode::Static);
        let permissions = PermissionSet::new().serialize();
        let jwt = issuer
            .issue("alice", "UALICE", 60, 1_700_000_000, &permissions, &account("AACCT"))
            .unwrap();
        let parts: Vec<&str> = jwt.split('.').collect();
        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(payload["exp"], 1_700_000_060);
    }
}
