use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// tally live counter server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "tally-server", version, about = "Shareable live counter server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "TALLY_PORT", default_value = "8080")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "TALLY_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./tally.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "TALLY_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (SQLite database)
    #[arg(long, env = "TALLY_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Session actor configuration (loaded from [session] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub session: Option<SessionConfig>,
}

/// Configuration for session actors: tick cadence and idle eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Milliseconds between counter ticks (default: 1000)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Seconds an actor with no subscribers stays resident before
    /// deactivating (default: 60)
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            idle_timeout_secs: 60,
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_idle_timeout_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            config: "./tally.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            session: Some(SessionConfig::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (TALLY_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("TALLY_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# tally Live Counter Server Configuration
# Place this file at ./tally.toml or specify with --config <path>
# All settings can be overridden via environment variables (TALLY_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database
# data_dir = "./data"

# ---- Session Actors ----
# [session]

# Milliseconds between counter ticks (default: 1000)
# tick_interval_ms = 1000

# Seconds an actor with no live subscribers stays resident before it
# deactivates and is re-activated from storage on the next visit (default: 60)
# idle_timeout_secs = 60
"#
    .to_string()
}
