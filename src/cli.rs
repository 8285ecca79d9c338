use std::env;
use std::path::PathBuf;

use clap::Parser;
use clap_complete::Shell;

use crate::config::Config;
use crate::error::Result;

/// Environment variable consulted for the TV password when
/// `--password` is not given.
pub const PASSWORD_ENV: &str = "AMBI_TV_PASSWORD";

#[derive(Parser, Debug)]
#[command(name = "ambi-yeelight")]
#[command(version)]
#[command(about = "Mirror a Philips TV's ambilight colour onto a Yeelight bulb")]
pub struct Args {
    /// TOML configuration file. Flags below override its values.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// TV hostname or IP address
    #[arg(long)]
    pub host: Option<String>,

    /// TV digest username
    #[arg(long)]
    pub username: Option<String>,

    /// TV digest password (or set AMBI_TV_PASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// Bulb address, or a comma-separated list of addresses
    #[arg(long)]
    pub address: Option<String>,

    /// Sampling position (see --list-positions)
    #[arg(long)]
    pub display_options: Option<String>,

    /// Display name of the switch
    #[arg(long)]
    pub name: Option<String>,

    /// Inner follow-loop period in milliseconds
    #[arg(long)]
    pub sleep_ms: Option<u64>,

    /// Availability poll period in seconds
    #[arg(long)]
    pub scan_secs: Option<u64>,

    /// Per-request deadline in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// JointSpace API version of the TV
    #[arg(long)]
    pub api_version: Option<u8>,

    /// Log filter, used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print every accepted display option and exit
    #[arg(long)]
    pub list_positions: bool,

    /// Print a shell completion script and exit
    #[arg(long, value_enum)]
    pub completions: Option<Shell>,
}

impl Args {
    /// Load the config file (if any) and apply flag and environment overrides.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        self.apply_overrides(&mut config, env::var(PASSWORD_ENV).ok());
        Ok(config)
    }

    /// Flags win over the file; the environment password only fills in
    /// when no `--password` flag was given.
    pub fn apply_overrides(&self, config: &mut Config, env_password: Option<String>) {
        if let Some(v) = &self.host {
            config.host = v.clone();
        }
        if let Some(v) = &self.username {
            config.username = v.clone();
        }
        match (&self.password, env_password) {
            (Some(v), _) => config.password = v.clone(),
            (None, Some(v)) if !v.is_empty() => config.password = v,
            _ => {}
        }
        if let Some(v) = &self.address {
            config.address = v.clone();
        }
        if let Some(v) = &self.display_options {
            config.display_options = v.clone();
        }
        if let Some(v) = &self.name {
            config.name = v.clone();
        }
        if let Some(v) = self.sleep_ms {
            config.sleep_interval_ms = v;
        }
        if let Some(v) = self.scan_secs {
            config.scan_interval_secs = v;
        }
        if let Some(v) = self.timeout_ms {
            config.request_timeout_ms = v;
        }
        if let Some(v) = self.api_version {
            config.api_version = v;
        }
    }
}
