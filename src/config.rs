//! Configuration management

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    /// NATS connection settings
    pub nats: NatsConfig,
    /// Credential signing mode and default lifetime
    pub credentials: CredentialConfig,
    /// Auth-callout responder settings
    pub responder: ResponderConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// NATS connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// URL of the NATS server to connect to.
    pub url: String,
    /// Path to a `.creds` file for connecting as the responder's own user.
    /// Mutually exclusive with `seed_file`.
    #[serde(default)]
    pub creds_file: Option<String>,
    /// Path to a raw nkey seed file for connecting as the responder's own
    /// user. Mutually exclusive with `creds_file`.
    #[serde(default)]
    pub seed_file: Option<String>,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            creds_file: None,
            seed_file: None,
        }
    }
}

impl NatsConfig {
    fn validate(&self) -> Result<()> {
        match (&self.creds_file, &self.seed_file) {
            (Some(_), Some(_)) => Err(Error::Config(
                "nats.creds_file and nats.seed_file are mutually exclusive".to_string(),
            )),
            (None, None) => Err(Error::Config(
                "one of nats.creds_file or nats.seed_file is required".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Which identifier the issued user JWT carries, and for how long it's
/// valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Static (account-name `aud`) or operator (`issuer_account`) mode.
    pub mode: IssuanceModeConfig,
    /// Default credential lifetime. `0s` means no expiry.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            mode: IssuanceModeConfig::Static,
            default_ttl: Duration::from_secs(0),
        }
    }
}

/// Wire-level mirror of [`crate::credential::IssuanceMode`]; kept separate so
/// `credential.rs` doesn't need a serde dependency on its own enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceModeConfig {
    /// See [`crate::credential::IssuanceMode::Static`].
    Static,
    /// See [`crate::credential::IssuanceMode::Operator`].
    Operator,
}

impl From<IssuanceModeConfig> for crate::credential::IssuanceMode {
    fn from(value: IssuanceModeConfig) -> Self {
        match value {
            IssuanceModeConfig::Static => Self::Static,
            IssuanceModeConfig::Operator => Self::Operator,
        }
    }
}

/// Auth-callout responder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Queue group the responder subscribes under, so multiple instances
    /// load-balance.
    pub queue_group: String,
    /// Name of the account whose key signs the auth-callout response
    /// envelope. Defaults to `"AUTH"`, matching the reserved account NATS
    /// itself uses for decentralized auth callout.
    pub signing_account: String,
    /// Seed for the account's signing keypair. Required at startup; kept
    /// out of the default so a missing value fails loudly rather than
    /// silently minting an ephemeral key every restart.
    #[serde(default)]
    pub signing_seed: Option<String>,
    /// Seed for the curve (`XKey`) keypair used to decrypt/encrypt the
    /// callout envelope, if the NATS server has `auth_callout.xkey`
    /// configured. Omit to run without envelope encryption.
    #[serde(default)]
    pub encryption_seed: Option<String>,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            queue_group: "nauts".to_string(),
            signing_account: "AUTH".to_string(),
            signing_seed: None,
            encryption_seed: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `RUST_LOG`-style filter/level, e.g. `"info"` or `"nauts=debug,info"`.
    pub level: String,
    /// `"text"` or `"json"`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be
    /// parsed, or fails validation (e.g. both/neither of `nats.creds_file`
    /// and `nats.seed_file` set).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!("config file not found: {}", p.display())));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("NAUTS_").split("__"));

        let config: Self = figment.extract().map_err(|e| Error::Config(e.to_string()))?;
        config.nats.validate()?;

        Ok(config)
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
