//! Configuration file and validation.
//!
//! ```toml
//! host = "192.168.1.40"
//! username = "tv-user"
//! password = "tv-secret"
//! address = "192.168.1.60"
//! display_options = "top-middle-average"
//! name = "Living room ambilight"
//! sleep_interval_ms = 50
//! ```
//!
//! Every key is optional. Missing keys fall back to the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AmbiError, Result};
use crate::sampler::Position;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_USER: &str = "user";
pub const DEFAULT_PASS: &str = "pass";
pub const DEFAULT_NAME: &str = "Ambilights+Yeelight";
pub const DEFAULT_DISPLAY_OPTIONS: &str = "top";

/// How long one ambilight configuration is trusted before refetching.
pub const CONFIG_REFRESH: Duration = Duration::from_secs(10);
/// Pause after a failed bulb probe.
pub const PROBE_BACKOFF: Duration = Duration::from_secs(2);

/// On-disk / command-line configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// TV hostname or IP.
    pub host: String,
    pub username: String,
    pub password: String,
    /// Bulb host, or a comma-separated list of hosts.
    pub address: String,
    /// Sampling position name.
    pub display_options: String,
    pub name: String,
    /// Inner follow-loop period.
    pub sleep_interval_ms: u64,
    /// Period of the external availability poll.
    pub scan_interval_secs: u64,
    /// Per-call deadline for every TV and bulb request.
    pub request_timeout_ms: u64,
    /// JointSpace API version of the TV.
    pub api_version: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            username: DEFAULT_USER.into(),
            password: DEFAULT_PASS.into(),
            address: DEFAULT_HOST.into(),
            display_options: DEFAULT_DISPLAY_OPTIONS.into(),
            name: DEFAULT_NAME.into(),
            sleep_interval_ms: 50,
            scan_interval_secs: 30,
            request_timeout_ms: 5_000,
            api_version: 6,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| AmbiError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AmbiError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Check the configuration and derive the controller settings.
    ///
    /// # Errors
    /// [`AmbiError::Config`] for an unknown position, an empty host or
    /// bulb list, or a zero interval/timeout.
    pub fn validate(&self) -> Result<SwitchConfig> {
        if self.host.trim().is_empty() {
            return Err(AmbiError::Config("host must not be empty".into()));
        }
        let bulb_addresses = parse_addresses(&self.address);
        if bulb_addresses.is_empty() {
            return Err(AmbiError::Config("address must name at least one bulb".into()));
        }
        if self.sleep_interval_ms == 0 {
            return Err(AmbiError::Config("sleep_interval_ms must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(AmbiError::Config("request_timeout_ms must be positive".into()));
        }
        if self.scan_interval_secs == 0 {
            return Err(AmbiError::Config("scan_interval_secs must be positive".into()));
        }
        let position: Position = self.display_options.parse()?;

        Ok(SwitchConfig {
            name: self.name.clone(),
            position,
            bulb_addresses,
            sleep_interval: Duration::from_millis(self.sleep_interval_ms),
            device_timeout: self.request_timeout(),
            probe_backoff: PROBE_BACKOFF,
        })
    }
}

/// Validated settings the switch controller runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchConfig {
    pub name: String,
    pub position: Position,
    /// Never empty. Only the first entry is driven.
    pub bulb_addresses: Vec<String>,
    pub sleep_interval: Duration,
    pub device_timeout: Duration,
    pub probe_backoff: Duration,
}

impl SwitchConfig {
    pub fn new(name: impl Into<String>, position: Position, bulb: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position,
            bulb_addresses: vec![bulb.into()],
            sleep_interval: Duration::from_millis(50),
            device_timeout: Duration::from_secs(5),
            probe_backoff: PROBE_BACKOFF,
        }
    }

    pub fn primary_bulb(&self) -> &str {
        self.bulb_addresses.first().map(String::as_str).unwrap_or(DEFAULT_HOST)
    }

    /// Inner iterations per ambilight configuration refresh:
    /// `ceil(10 s / sleep_interval)`.
    pub fn iterations_per_cycle(&self) -> u32 {
        let step = self.sleep_interval.as_nanos().max(1);
        let cycle = CONFIG_REFRESH.as_nanos();
        cycle.div_ceil(step).min(u128::from(u32::MAX)) as u32
    }
}

/// Split a comma-separated host list, trimming blanks.
pub fn parse_addresses(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}
