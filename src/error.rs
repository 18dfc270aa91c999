//! Error types for nauts

use std::io;

use thiserror::Error;

/// Result type alias for nauts
pub type Result<T> = std::result::Result<T, Error>;

/// The phase of the authentication pipeline an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Parsing the connect token out of the callout envelope.
    Parse,
    /// Selecting the authentication provider for the requested account.
    Route,
    /// Calling the provider's `verify` method.
    Verify,
    /// Scoping the verified user to the requested account.
    Scope,
    /// Compiling policies into a permission set.
    Compile,
    /// Signing the resulting user credential.
    Sign,
}

/// Stable classification of an authentication failure, independent of phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The presented credentials did not verify.
    InvalidCredentials,
    /// The provider has no record of this user.
    UserNotFound,
    /// The connect token was malformed or of an unsupported shape.
    InvalidTokenType,
    /// The requested account does not exist or is not routable.
    InvalidAccount,
    /// No policies are bound to the requested role.
    RoleNotFound,
    /// A policy id referenced by a binding does not exist.
    PolicyNotFound,
    /// No provider is registered under the requested id.
    ProviderNotFound,
    /// The selected provider does not manage the requested account.
    ProviderNotManageable,
    /// More than one provider claims the requested account.
    ProviderAmbiguous,
    /// An unexpected internal failure.
    Internal,
}

/// A phase-tagged authentication failure.
///
/// This is the error type providers and the controller exchange internally;
/// the callout responder genericizes it before it reaches the wire (see
/// [`crate::callout`]).
#[derive(Debug, Error)]
#[error("{phase:?}: {message}")]
pub struct AuthError {
    /// Stable failure classification.
    pub kind: ErrorKind,
    /// Pipeline phase the failure occurred in.
    pub phase: Phase,
    /// The user id under authentication, if known at the point of failure.
    pub user_id: Option<String>,
    /// Human-readable detail, logged but never echoed to the wire.
    pub message: String,
    /// Underlying cause, if any.
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AuthError {
    /// Construct a new phase-tagged error.
    pub fn new(
        kind: ErrorKind,
        phase: Phase,
        user_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            phase,
            user_id,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Wrap a [`ProviderError`] with phase and user context.
    pub fn from_provider(err: ProviderError, phase: Phase, user_id: Option<String>) -> Self {
        let message = err.message.clone();
        Self {
            kind: err.kind,
            phase,
            user_id,
            message,
            cause: Some(Box::new(err)),
        }
    }
}

/// An error surfaced by an [`crate::provider::AuthenticationProvider`] or
/// [`crate::provider::PolicyProvider`], before the controller attaches phase
/// and user context.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct ProviderError {
    /// Stable failure classification.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl ProviderError {
    /// Construct a new provider error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// nauts errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// An authentication pipeline failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// NATS error
    #[error("nats error: {0}")]
    Nats(String),

    /// Credential signing error
    #[error("signing error: {0}")]
    Signing(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}
