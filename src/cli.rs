//! Command-line interface

use std::path::PathBuf;

use clap::Parser;

/// Policy compiler and auth-callout responder for a NATS-style publish/subscribe fabric
#[derive(Parser, Debug)]
#[command(name = "nauts")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "NAUTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// NATS server URL
    #[arg(long, env = "NAUTS_NATS_URL")]
    pub nats_url: Option<String>,

    /// Path to a `.creds` file to connect as the responder's own user
    #[arg(long, env = "NAUTS_NATS_CREDS_FILE")]
    pub nats_creds_file: Option<PathBuf>,

    /// Path to a raw nkey seed file to connect as the responder's own user
    #[arg(long, env = "NAUTS_NATS_SEED_FILE")]
    pub nats_seed_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "NAUTS_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "NAUTS_LOG_FORMAT")]
    pub log_format: Option<String>,
}
