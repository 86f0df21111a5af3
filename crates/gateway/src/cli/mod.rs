pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};

/// Grov — a transparent interceptor between a coding-assistant client
/// and its upstream LLM provider.
#[derive(Debug, Parser)]
#[command(name = "grov-proxy", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Switch structured logging to the JSON file sink and enable
    /// per-request `TraceEvent` entries (REQUEST/RESPONSE/INJECTION).
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the proxy server (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load the configuration from the path specified by `GROV_CONFIG` (or
/// `config.toml` by default). Shared by `serve`, `doctor`, and `config`
/// so the logic lives in one place.
pub fn load_config() -> anyhow::Result<(grov_domain::config::Config, String)> {
    let config_path = std::env::var("GROV_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        grov_domain::config::Config::default()
    };

    Ok((config, config_path))
}
