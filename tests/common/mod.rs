//! In-memory TV and bulb used by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ambi_yeelight::{
    AmbiError, AmbiSwitch, AmbilightConfiguration, AmbilightLayers, BulbClient, BulbProperties,
    Flow, MenuSetting, PixelLayer, Position, Power, Result, StyleName, SwitchConfig, TvClient,
};
use async_trait::async_trait;

fn offline(what: &str) -> AmbiError {
    AmbiError::Connect {
        target: what.to_string(),
        detail: "mock offline".to_string(),
    }
}

// ---------------------------------------------------------------------------
// MockTv
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockTv {
    /// `None` makes `ambilight_configuration` fail.
    pub ambi: Mutex<Option<AmbilightConfiguration>>,
    /// Served from both measured and processed.
    pub layer: Mutex<Option<PixelLayer>>,
    pub unreachable: AtomicBool,
    pub panic_on_configuration: AtomicBool,
    /// Measured and processed never answer.
    pub hang_layers: AtomicBool,
    pub configuration_calls: AtomicUsize,
    pub measured_calls: AtomicUsize,
    pub processed_calls: AtomicUsize,
}

impl MockTv {
    pub fn new(ambi: Option<AmbilightConfiguration>, layer: Option<PixelLayer>) -> Self {
        Self {
            ambi: Mutex::new(ambi),
            layer: Mutex::new(layer),
            ..Default::default()
        }
    }

    fn layers(&self) -> AmbilightLayers {
        AmbilightLayers {
            layer1: self.layer.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl TvClient for MockTv {
    async fn update(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(offline("tv"));
        }
        Ok(())
    }

    async fn ambilight_configuration(&self) -> Result<AmbilightConfiguration> {
        self.configuration_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_configuration.load(Ordering::SeqCst) {
            panic!("mock TV returned garbage");
        }
        self.ambi.lock().unwrap().clone().ok_or_else(|| offline("tv"))
    }

    async fn ambilight_measured(&self) -> Result<AmbilightLayers> {
        self.measured_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_layers.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.layers())
    }

    async fn ambilight_processed(&self) -> Result<AmbilightLayers> {
        self.processed_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_layers.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.layers())
    }
}

// ---------------------------------------------------------------------------
// MockBulb
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulbCall {
    GetProperties,
    TurnOn,
    TurnOff,
    StartMusic,
    StopMusic,
    SetBrightness(u8),
    StartFlow(Flow),
}

pub struct MockBulb {
    pub props: Mutex<BulbProperties>,
    pub unreachable: AtomicBool,
    /// When false, `start_music` succeeds but the bulb never reports it.
    pub music_supported: AtomicBool,
    pub fail_flows: AtomicBool,
    /// `start_flow` never answers.
    pub hang_flows: AtomicBool,
    /// `stop_music` and `turn_off` report errors.
    pub fail_shutdown: AtomicBool,
    pub calls: Mutex<Vec<BulbCall>>,
}

impl Default for MockBulb {
    fn default() -> Self {
        Self {
            props: Mutex::new(BulbProperties::default()),
            unreachable: AtomicBool::new(false),
            music_supported: AtomicBool::new(true),
            fail_flows: AtomicBool::new(false),
            hang_flows: AtomicBool::new(false),
            fail_shutdown: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockBulb {
    pub fn with_props(power: Power, music_on: bool) -> Self {
        let bulb = Self::default();
        *bulb.props.lock().unwrap() = BulbProperties { power, music_on };
        bulb
    }

    fn record(&self, call: BulbCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<BulbCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than property reads.
    pub fn commands(&self) -> Vec<BulbCall> {
        self.calls()
            .into_iter()
            .filter(|c| *c != BulbCall::GetProperties)
            .collect()
    }

    pub fn flows(&self) -> Vec<Flow> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BulbCall::StartFlow(f) => Some(f),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BulbClient for MockBulb {
    async fn get_properties(&self) -> Result<BulbProperties> {
        self.record(BulbCall::GetProperties);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(offline("bulb"));
        }
        Ok(*self.props.lock().unwrap())
    }

    async fn turn_on(&self) -> Result<()> {
        self.record(BulbCall::TurnOn);
        self.props.lock().unwrap().power = Power::On;
        Ok(())
    }

    async fn turn_off(&self) -> Result<()> {
        self.record(BulbCall::TurnOff);
        if self.fail_shutdown.load(Ordering::SeqCst) {
            return Err(offline("bulb"));
        }
        self.props.lock().unwrap().power = Power::Off;
        Ok(())
    }

    async fn start_music(&self) -> Result<()> {
        self.record(BulbCall::StartMusic);
        if self.music_supported.load(Ordering::SeqCst) {
            self.props.lock().unwrap().music_on = true;
        }
        Ok(())
    }

    async fn stop_music(&self) -> Result<()> {
        self.record(BulbCall::StopMusic);
        if self.fail_shutdown.load(Ordering::SeqCst) {
            return Err(offline("bulb"));
        }
        self.props.lock().unwrap().music_on = false;
        Ok(())
    }

    async fn set_brightness(&self, level: u8) -> Result<()> {
        self.record(BulbCall::SetBrightness(level));
        Ok(())
    }

    async fn start_flow(&self, flow: &Flow) -> Result<()> {
        self.record(BulbCall::StartFlow(flow.clone()));
        if self.hang_flows.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_flows.load(Ordering::SeqCst) {
            return Err(offline("bulb"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn ambi(style: StyleName, menu: Option<MenuSetting>) -> AmbilightConfiguration {
    AmbilightConfiguration {
        style_name: style,
        menu_setting: menu,
        is_expert: false,
    }
}

pub fn switch_config(position: Position, sleep: Duration) -> SwitchConfig {
    let mut cfg = SwitchConfig::new("Test ambilight", position, "10.0.0.60");
    cfg.sleep_interval = sleep;
    cfg
}

pub fn make_switch(
    tv: MockTv,
    bulb: MockBulb,
    position: Position,
    sleep: Duration,
) -> AmbiSwitch<MockTv, MockBulb> {
    AmbiSwitch::new(switch_config(position, sleep), tv, bulb)
}
