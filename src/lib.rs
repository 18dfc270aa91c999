//! nauts
//!
//! Policy compiler and auth-callout responder for a NATS-style
//! publish/subscribe fabric.
//!
//! # Pipeline
//!
//! A connecting client's credentials are verified by an
//! [`provider::AuthenticationProvider`], scoped to the requested account,
//! compiled through the roles bound to it via [`policy::compile`], and
//! signed into a permissioned user JWT by [`credential::CredentialIssuer`].
//! [`controller::Controller`] wires the whole pipeline together;
//! [`callout::CalloutResponder`] is the NATS-facing edge that drives it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod callout;
pub mod cli;
pub mod config;
pub mod context;
pub mod controller;
pub mod credential;
pub mod error;
pub mod model;
pub mod permission;
pub mod policy;
pub mod provider;
pub mod resource;
pub mod template;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
