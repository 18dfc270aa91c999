//! nauts - auth-callout responder entry point

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use nats_jwt_rs::user::User;
use tokio::sync::Notify;
use tracing::{error, info};

use nauts::callout::{CalloutConfig, CalloutResponder};
use nauts::cli::Cli;
use nauts::config::Config;
use nauts::error::Error;
use nauts::setup_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("failed to set up tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(ref url) = cli.nats_url {
                config.nats.url = url.clone();
            }
            if let Some(ref path) = cli.nats_creds_file {
                config.nats.creds_file = Some(path.display().to_string());
            }
            if let Some(ref path) = cli.nats_seed_file {
                config.nats.seed_file = Some(path.display().to_string());
            }
            config
        }
        Err(e) => {
            error!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        nats_url = %config.nats.url,
        queue_group = %config.responder.queue_group,
        "starting nauts"
    );

    let client = match connect_nats(&config).await {
        Ok(c) => c,
        Err(e) => {
            error!("failed to connect to NATS: {e}");
            return ExitCode::FAILURE;
        }
    };

    let Some(signing_seed) = config.responder.signing_seed.as_deref() else {
        error!("responder.signing_seed is required");
        return ExitCode::FAILURE;
    };
    let signing_key = match nkeys::KeyPair::from_seed(signing_seed) {
        Ok(k) => k,
        Err(e) => {
            error!("invalid responder.signing_seed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let encryption_key = match config.responder.encryption_seed.as_deref() {
        Some(seed) => match nkeys::XKey::from_seed(seed) {
            Ok(k) => Some(k),
            Err(e) => {
                error!("invalid responder.encryption_seed: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    // The controller's collaborators (provider router, policy/account
    // providers) are supplied by the deployment embedding this binary; see
    // nauts::provider for the trait contracts a real deployment implements.
    let controller = match build_controller(&config) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to build authentication controller: {e}");
            return ExitCode::FAILURE;
        }
    };

    let responder = Arc::new(CalloutResponder::new(
        client,
        controller,
        CalloutConfig {
            queue_group: config.responder.queue_group.clone(),
            ttl_secs: config.credentials.default_ttl.as_secs(),
            signing_key,
            encryption_key,
        },
    ));

    let shutdown = Arc::new(Notify::new());
    let shutdown_on_signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_on_signal.notify_waiters();
    });

    if let Err(e) = responder.run(shutdown).await {
        error!("auth-callout responder error: {e}");
        return ExitCode::FAILURE;
    }

    info!("nauts shutdown complete");
    ExitCode::SUCCESS
}

async fn connect_nats(config: &nauts::config::Config) -> Result<async_nats::Client, Error> {
    if let Some(creds_file) = &config.nats.creds_file {
        let opts = async_nats::ConnectOptions::with_credentials_file(creds_file.into())
            .await
            .map_err(|e| Error::Nats(e.to_string()))?;
        return opts
            .connect(&config.nats.url)
            .await
            .map_err(|e| Error::Nats(e.to_string()));
    }

    let seed_file = config
        .nats
        .seed_file
        .as_ref()
        .ok_or_else(|| Error::Config("nats.creds_file or nats.seed_file is required".to_string()))?;
    let signing_seed = config.responder.signing_seed.as_deref().ok_or_else(|| {
        Error::Config("responder.signing_seed is required to self-issue a connection JWT".to_string())
    })?;

    let user_seed = std::fs::read_to_string(seed_file)?;
    let user_key = nkeys::KeyPair::from_seed(user_seed.trim()).map_err(|e| Error::Signing(e.to_string()))?;
    let account_key = nkeys::KeyPair::from_seed(signing_seed).map_err(|e| Error::Signing(e.to_string()))?;

    let claims = User::new_claims("nauts-responder".to_string(), user_key.public_key());
    let jwt = claims.encode(&account_key).map_err(|e| Error::Signing(e.to_string()))?;

    let opts = async_nats::ConnectOptions::new().jwt(jwt, move |nonce| {
        let kp = user_key.clone();
        async move { kp.sign(&nonce).map_err(async_nats::AuthError::new) }
    });
    opts.connect(&config.nats.url)
        .await
        .map_err(|e| Error::Nats(e.to_string()))
}

fn build_controller(config: &nauts::config::Config) -> Result<nauts::controller::Controller, Error> {
    let _ = config;
    Err(Error::Config(
        "build_controller must be supplied by the deployment embedding nauts \
         (wire an AuthenticationProvider, PolicyProvider, and AccountProvider)"
            .to_string(),
    ))
}
