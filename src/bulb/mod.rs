//! # Bulb
//!
//! Write side of the bridge.
//!
//! [`BulbClient`] is the seam the switch controller drives;
//! [`YeelightBulb`] implements it over the Yeelight LAN protocol,
//! including the music-mode side channel that lifts the bulb's
//! command rate limit.

pub mod client;
pub mod flow;

use async_trait::async_trait;

use crate::error::Result;

pub use client::YeelightBulb;
pub use flow::{Flow, FlowAction, Transition};

/// Power state as reported by `get_prop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Power {
    On,
    #[default]
    Off,
}

impl Power {
    /// Lenient parse of the bulb's `"on"`/`"off"`.
    pub fn from_prop(s: &str) -> Self {
        if s.eq_ignore_ascii_case("on") {
            Power::On
        } else {
            Power::Off
        }
    }
}

impl std::fmt::Display for Power {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Power::On => write!(f, "on"),
            Power::Off => write!(f, "off"),
        }
    }
}

/// The two properties the controller polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulbProperties {
    pub power: Power,
    pub music_on: bool,
}

/// Operations the controller needs from a bulb.
#[async_trait]
pub trait BulbClient: Send + Sync + 'static {
    async fn get_properties(&self) -> Result<BulbProperties>;

    async fn turn_on(&self) -> Result<()>;

    async fn turn_off(&self) -> Result<()>;

    /// Enter music mode. Idempotent.
    async fn start_music(&self) -> Result<()>;

    async fn stop_music(&self) -> Result<()>;

    /// `level` is a percentage; the bulb's floor is 1.
    async fn set_brightness(&self, level: u8) -> Result<()>;

    async fn start_flow(&self, flow: &Flow) -> Result<()>;
}
