//! # ambi-yeelight
//!
//! Mirror a Philips TV's ambilight onto a Yeelight bulb.
//!
//! The [`AmbiSwitch`] polls the TV's ambilight pixel layer, reduces one
//! edge (or corner) to a single colour with the [`sampler`], and streams
//! it to the bulb in music mode. Device access goes through the
//! [`TvClient`] and [`BulbClient`] traits; [`PhilipsTv`] and
//! [`YeelightBulb`] are the real implementations.
//!
//! ```rust,ignore
//! let config = Config::load("ambi.toml")?;
//! let switch_cfg = config.validate()?;
//! let tv = PhilipsTv::builder(&config.host)
//!     .credentials(&config.username, &config.password)
//!     .build()?;
//! let bulb = YeelightBulb::new(switch_cfg.primary_bulb());
//! let switch = AmbiSwitch::new(switch_cfg, tv, bulb);
//! switch.turn_on().await;
//! ```

pub mod bulb;
pub mod cli;
pub mod color;
pub mod config;
pub mod controller;
pub mod error;
pub mod sampler;
pub mod tv;

pub use bulb::{BulbClient, BulbProperties, Flow, FlowAction, Power, Transition, YeelightBulb};
pub use color::{Rgb, DEFAULT_RGB};
pub use config::{Config, SwitchConfig};
pub use controller::{plan_push, push, AmbiSwitch, Lifecycle, Probe, PushPlan, SwitchState};
pub use error::{AmbiError, Result};
pub use sampler::{sample, Position};
pub use tv::{
    AmbilightConfiguration, AmbilightLayers, Edge, MenuSetting, PhilipsTv, PixelLayer, StyleName,
    TvClient,
};
