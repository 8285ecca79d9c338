//! # TV
//!
//! Read side of the bridge: the TV's ambilight configuration and the
//! per-edge pixel layers it measures.
//!
//! [`TvClient`] is the seam the switch controller talks through;
//! [`PhilipsTv`] implements it over the JointSpace HTTP API.

pub mod client;
pub mod digest;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use client::{PhilipsTv, PhilipsTvBuilder, TvConfig};
pub use types::{
    AmbilightConfiguration, AmbilightLayers, Edge, EdgePixels, MenuSetting, PixelLayer, StyleName,
};

/// Operations the controller needs from a TV.
///
/// Every method is a single poll; nothing is pushed by the TV.
#[async_trait]
pub trait TvClient: Send + Sync + 'static {
    /// Reachability probe.
    async fn update(&self) -> Result<()>;

    /// Current ambilight style and menu setting.
    async fn ambilight_configuration(&self) -> Result<AmbilightConfiguration>;

    /// Raw colours measured from the picture, before ambilight processing.
    async fn ambilight_measured(&self) -> Result<AmbilightLayers>;

    /// Colours the LEDs are actually showing, after processing.
    async fn ambilight_processed(&self) -> Result<AmbilightLayers>;
}
