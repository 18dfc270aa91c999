//! Provider-selection router: picks the [`AuthenticationProvider`] that
//! should handle a connecting account, either by explicit id or by matching
//! the provider's account patterns.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, ErrorKind, ProviderError};

use super::AuthenticationProvider;

/// The reserved system account, excluded from `"*"` pattern matches.
pub const SYSTEM_ACCOUNT: &str = "SYS";
/// The reserved auth-callout account, excluded from `"*"` pattern matches.
pub const AUTH_ACCOUNT: &str = "AUTH";

/// Routes an incoming connect request to the provider that manages its
/// account.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn AuthenticationProvider>>,
}

impl ProviderRouter {
    /// Build a router from `(id, provider)` pairs. Ids must be unique and
    /// non-empty, and at least one provider must be registered.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no providers are given or an id is empty
    /// or duplicated.
    pub fn new(providers: Vec<(String, Arc<dyn AuthenticationProvider>)>) -> Result<Self, Error> {
        if providers.is_empty() {
            return Err(Error::Config("no authentication providers configured".to_string()));
        }
        let mut map = HashMap::with_capacity(providers.len());
        for (id, provider) in providers {
            if id.is_empty() {
                return Err(Error::Config("provider id must not be empty".to_string()));
            }
            if map.insert(id.clone(), provider).is_some() {
                return Err(Error::Config(format!("duplicate provider id: {id}")));
            }
        }
        Ok(Self { providers: map })
    }

    /// Select the provider that should authenticate `account`.
    ///
    /// If `explicit_id` is given (from the connect token's `ap` field), it is
    /// used directly, provided that provider also manages `account`. If not,
    /// exactly one registered provider must claim `account` or the selection
    /// is rejected as ambiguous or unmanaged.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] with kind `ProviderNotFound`,
    /// `ProviderNotManageable`, or `ProviderAmbiguous`.
    pub fn select(
        &self,
        account: &str,
        explicit_id: Option<&str>,
    ) -> Result<(String, Arc<dyn AuthenticationProvider>), ProviderError> {
        if let Some(id) = explicit_id {
            let provider = self.providers.get(id).ok_or_else(|| {
                ProviderError::new(ErrorKind::ProviderNotFound, format!("unknown provider: {id}"))
            })?;
            if !account_manageable(provider.as_ref(), account) {
                return Err(ProviderError::new(
                    ErrorKind::ProviderNotManageable,
                    format!("provider {id} does not manage account {account}"),
                ));
            }
            return Ok((id.clone(), Arc::clone(provider)));
        }

        let mut matches: Vec<(&String, &Arc<dyn AuthenticationProvider>)> = self
            .providers
            .iter()
            .filter(|(_, p)| account_manageable(p.as_ref(), account))
            .collect();

        match matches.len() {
            0 => Err(ProviderError::new(
                ErrorKind::ProviderNotManageable,
                format!("no provider manages account {account}"),
            )),
            1 => {
                let (id, provider) = matches.remove(0);
                Ok((id.clone(), Arc::clone(provider)))
            }
            _ => Err(ProviderError::new(
                ErrorKind::ProviderAmbiguous,
                format!("multiple providers manage account {account}"),
            )),
        }
    }
}

fn account_manageable(provider: &dyn AuthenticationProvider, account: &str) -> bool {
    provider
        .manageable_accounts()
        .iter()
        .any(|pattern| pattern_matches(pattern, account))
}

fn pattern_matches(pattern: &str, account: &str) -> bool {
    if pattern == "*" {
        return account != SYSTEM_ACCOUNT && account != AUTH_ACCOUNT;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return account.starts_with(prefix);
    }
    pattern == account
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;
    use crate::provider::VerifyRequest;
    use async_trait::async_trait;

    struct FakeProvider {
        patterns: Vec<&'static str>,
    }

    #[async_trait]
    impl AuthenticationProvider for FakeProvider {
        async fn verify(&self, _request: &VerifyRequest) -> Result<User, ProviderError> {
            unreachable!("router tests don't call verify")
        }

        fn manageable_accounts(&self) -> Vec<String> {
            self.patterns.iter().map(|s| (*s).to_string()).collect()
        }
    }

    fn router(entries: Vec<(&str, Vec<&'static str>)>) -> ProviderRouter {
        let providers = entries
            .into_iter()
            .map(|(id, patterns)| {
                (
                    id.to_string(),
                    Arc::new(FakeProvider { patterns }) as Arc<dyn AuthenticationProvider>,
                )
            })
            .collect();
        ProviderRouter::new(providers).unwrap()
    }

    #[test]
    fn rejects_empty_provider_list() {
        assert!(ProviderRouter::new(vec![]).is_err());
    }

    #[test]
    fn selects_unique_matching_provider() {
        let r = router(vec![("ldap", vec!["ACME*"])]);
        let (id, _) = r.select("ACME-PROD", None).unwrap();
        assert_eq!(id, "ldap");
    }

    #[test]
    fn wildcard_excludes_reserved_accounts() {
        let r = router(vec![("default", vec!["*"])]);
        assert!(matches!(
            r.select(SYSTEM_ACCOUNT, None).unwrap_err().kind,
            ErrorKind::ProviderNotManageable
        ));
        assert!(matches!(
            r.select(AUTH_ACCOUNT, None).unwrap_err().kind,
            ErrorKind::ProviderNotManageable
        ));
    }

    #[test]
    fn ambiguous_when_multiple_providers_match() {
        let r = router(vec![("a", vec!["ACME*"]), ("b", vec!["ACME*"])]);
        assert!(matches!(
            r.select("ACME-PROD", None).unwrap_err().kind,
            ErrorKind::ProviderAmbiguous
        ));
    }

    #[test]
    fn explicit_id_bypasses_ambiguity_but_still_checks_manageability() {
        let r = router(vec![("a", vec!["ACME*"]), ("b", vec!["OTHER*"])]);
        let (id, _) = r.select("ACME-PROD", Some("a")).unwrap();
        assert_eq!(id, "a");
        assert!(matches!(
            r.select("ACME-PROD", Some("b")).unwrap_err().kind,
            ErrorKind::ProviderNotManageable
        ));
    }

    #[test]
    fn explicit_unknown_id_is_not_found() {
        let r = router(vec![("a", vec!["*"])]);
        assert!(matches!(
            r.select("ACME", Some("missing")).unwrap_err().kind,
            ErrorKind::ProviderNotFound
        ));
    }
}
