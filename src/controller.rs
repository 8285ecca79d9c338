//! The switch: lifecycle, availability polling and the follow loop.
//!
//! ```text
//!   Off ──turn_on──▶ Starting ──music mode confirmed──▶ Following
//!    ▲                  │                                  │
//!    └──────────────────┴────────turn_off / panic──────────┘
//! ```
//!
//! While following, a background task runs two nested loops: the outer
//! one refetches the ambilight configuration, the inner one samples the
//! pixel layer and pushes a colour every `sleep_interval`, for at most
//! [`CONFIG_REFRESH`](crate::config::CONFIG_REFRESH) before the outer
//! loop refreshes again. Stopping is cooperative: `turn_off` clears an
//! atomic flag the inner loop checks before every iteration.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bulb::{BulbClient, Flow, Power, Transition};
use crate::color::{Rgb, DEFAULT_RGB};
use crate::config::SwitchConfig;
use crate::error::with_timeout;
use crate::sampler::sample;
use crate::tv::{AmbilightConfiguration, PixelLayer, TvClient};

/// Transition length while the TV follows the video picture.
pub const FOLLOW_VIDEO_TRANSITION_MS: u64 = 400;
/// Transition length for every other ambilight style.
pub const DEFAULT_TRANSITION_MS: u64 = 200;

/// Consecutive failures after which a loop warning escalates to an error.
const FAILURE_ESCALATION: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Off,
    Starting,
    Following,
}

/// Everything the controller knows about the devices, rebuilt on every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchState {
    /// The bulb reports music mode.
    pub is_on: bool,
    /// The last bulb probe succeeded.
    pub available: bool,
    /// The last TV probe succeeded.
    pub tv_reachable: bool,
    /// Last reported bulb power.
    pub power: Power,
    pub lifecycle: Lifecycle,
}

/// Result of one bulb probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Probe {
    pub available: bool,
    pub power_on: bool,
    pub music_on: bool,
}

/// What a push will do with a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushPlan {
    /// No usable picture: brightness to 0, then park on [`DEFAULT_RGB`].
    Dim(Flow),
    /// Normal colour update.
    Transition(Flow),
}

/// Transition length for the current ambilight style.
pub fn transition_ms(ambi: Option<&AmbilightConfiguration>) -> u64 {
    if ambi.is_some_and(AmbilightConfiguration::follows_video) {
        FOLLOW_VIDEO_TRANSITION_MS
    } else {
        DEFAULT_TRANSITION_MS
    }
}

/// Decide what to send for `sample`.
///
/// An absent sample, or pure black while the TV is in game mode, means
/// there is no picture worth mirroring.
pub fn plan_push(sample: Option<Rgb>, ambi: Option<&AmbilightConfiguration>) -> PushPlan {
    let duration = transition_ms(ambi);
    let game = ambi.is_some_and(AmbilightConfiguration::is_game_mode);

    match sample {
        Some(rgb) if !(rgb.is_black() && game) => {
            PushPlan::Transition(Flow::single(Transition::rgb(rgb, duration)))
        }
        _ => {
            let mut parked = Transition::rgb(DEFAULT_RGB, duration);
            parked.brightness = 0;
            PushPlan::Dim(Flow::single(parked))
        }
    }
}

/// Send one sample to `bulb`. Failures are logged and reported as `false`.
pub async fn push<B: BulbClient + ?Sized>(
    bulb: &B,
    sample: Option<Rgb>,
    ambi: Option<&AmbilightConfiguration>,
    timeout: Duration,
) -> bool {
    let result = match plan_push(sample, ambi) {
        PushPlan::Dim(flow) => {
            async {
                with_timeout("set_brightness", timeout, bulb.set_brightness(0)).await?;
                with_timeout("start_flow", timeout, bulb.start_flow(&flow)).await
            }
            .await
        }
        PushPlan::Transition(flow) => {
            with_timeout("start_flow", timeout, bulb.start_flow(&flow)).await
        }
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "failed to set the bulb colour");
            false
        }
    }
}

/// Counts consecutive failures of one loop step so a dead device logs
/// once per outage instead of once per iteration.
#[derive(Debug, Default)]
struct FailureStreak {
    count: u32,
}

impl FailureStreak {
    fn fail(&mut self, what: &str) {
        self.count = self.count.saturating_add(1);
        if self.count == 1 {
            warn!(step = what, "follow loop step failed");
        } else if self.count == FAILURE_ESCALATION {
            error!(step = what, consecutive_failures = self.count, "follow loop step keeps failing");
        }
    }

    fn succeed(&mut self, what: &str) {
        if self.count >= FAILURE_ESCALATION {
            info!(step = what, after = self.count, "follow loop step recovered");
        }
        self.count = 0;
    }
}

struct Inner<T, B> {
    config: SwitchConfig,
    tv: T,
    bulb: B,
    follow: AtomicBool,
    state: Mutex<SwitchState>,
    task: Mutex<Option<JoinHandle<bool>>>,
    /// Serializes `turn_on` and `turn_off`.
    lifecycle: tokio::sync::Mutex<()>,
}

/// A switch that makes a bulb follow a TV's ambilight.
///
/// Clones share the same state and background task.
pub struct AmbiSwitch<T, B> {
    inner: Arc<Inner<T, B>>,
}

impl<T, B> Clone for AmbiSwitch<T, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: TvClient, B: BulbClient> AmbiSwitch<T, B> {
    pub fn new(config: SwitchConfig, tv: T, bulb: B) -> Self {
        if config.bulb_addresses.len() > 1 {
            debug!(
                bulbs = config.bulb_addresses.len(),
                primary = %config.primary_bulb(),
                "only the first configured bulb is driven"
            );
        }
        Self {
            inner: Arc::new(Inner {
                config,
                tv,
                bulb,
                follow: AtomicBool::new(false),
                state: Mutex::new(SwitchState::default()),
                task: Mutex::new(None),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Entity surface
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &SwitchConfig {
        &self.inner.config
    }

    pub fn tv(&self) -> &T {
        &self.inner.tv
    }

    pub fn bulb(&self) -> &B {
        &self.inner.bulb
    }

    pub fn is_on(&self) -> bool {
        self.snapshot().is_on
    }

    /// `"on"` or `"off"`.
    pub fn state(&self) -> &'static str {
        if self.is_on() {
            "on"
        } else {
            "off"
        }
    }

    pub fn available(&self) -> bool {
        self.snapshot().available
    }

    /// The host must call [`update`](Self::update) periodically.
    pub fn should_poll(&self) -> bool {
        true
    }

    pub fn snapshot(&self) -> SwitchState {
        self.with_state(|s| *s)
    }

    /// Whether the follow loop has been asked to keep running.
    pub fn is_following(&self) -> bool {
        self.inner.follow.load(Ordering::SeqCst)
    }

    /// Whether a follow task exists and has not finished.
    pub fn follow_task_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .map(|t| t.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SwitchState) -> R) -> R {
        let mut guard = self
            .inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Read the bulb's power and music-mode state. Never fails: on error
    /// the bulb is reported offline after a short backoff.
    pub async fn probe(&self) -> Probe {
        let cfg = &self.inner.config;
        match with_timeout("get_properties", cfg.device_timeout, self.inner.bulb.get_properties()).await {
            Ok(props) => Probe {
                available: true,
                power_on: props.power == Power::On,
                music_on: props.music_on,
            },
            Err(e) => {
                error!(
                    error = %e,
                    bulb = %cfg.primary_bulb(),
                    backoff = ?cfg.probe_backoff,
                    "failed to find bulb, will retry after backoff"
                );
                tokio::time::sleep(cfg.probe_backoff).await;
                Probe::default()
            }
        }
    }

    /// One external poll tick: probe the bulb and the TV, rebuild state.
    pub async fn update(&self) {
        let probe = self.probe().await;
        let tv_reachable = match with_timeout(
            "tv update",
            self.inner.config.device_timeout,
            self.inner.tv.update(),
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "TV is not reachable");
                false
            }
        };

        self.with_state(|s| {
            s.available = probe.available;
            s.power = if probe.power_on { Power::On } else { Power::Off };
            s.is_on = probe.music_on;
            s.tv_reachable = tv_reachable;
        });
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Power the bulb up in music mode and start following the TV.
    ///
    /// Returns `true` when the follow loop is running afterwards.
    pub async fn turn_on(&self) -> bool {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let timeout = self.inner.config.device_timeout;
        let bulb = &self.inner.bulb;

        self.with_state(|s| s.lifecycle = Lifecycle::Starting);
        self.update().await;
        let before = self.snapshot();

        if before.power == Power::Off {
            if let Err(e) = with_timeout("turn_on", timeout, bulb.turn_on()).await {
                warn!(error = %e, "failed to power on the bulb");
            }
            if let Err(e) = with_timeout("start_music", timeout, bulb.start_music()).await {
                warn!(error = %e, "failed to enable music mode");
            }
        } else if !before.is_on {
            if let Err(e) = with_timeout("start_music", timeout, bulb.start_music()).await {
                warn!(error = %e, "failed to enable music mode");
            }
        }

        self.update().await;
        if !self.is_on() && self.follow_task_running() {
            warn!(name = %self.name(), "re-poll failed while following; loop left running");
            self.with_state(|s| s.lifecycle = Lifecycle::Following);
            return true;
        }
        if !self.is_on() {
            warn!(name = %self.name(), "bulb did not confirm music mode; not following");
            self.with_state(|s| s.lifecycle = Lifecycle::Off);
            return false;
        }

        self.spawn_follow();
        self.with_state(|s| s.lifecycle = Lifecycle::Following);
        debug!(name = %self.name(), position = %self.inner.config.position, "turned on");
        true
    }

    fn spawn_follow(&self) {
        let mut task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let running = task.as_ref().is_some_and(|h| !h.is_finished());
        self.inner.follow.store(true, Ordering::SeqCst);
        if running {
            debug!("follow loop already running");
            return;
        }
        let this = self.clone();
        *task = Some(tokio::spawn(async move { this.follow_tv().await }));
    }

    /// Ask the follow loop to stop at its next check. Does not wait.
    pub fn request_stop(&self) {
        self.inner.follow.store(false, Ordering::SeqCst);
    }

    /// Wait for the follow task to finish, returning its result.
    pub async fn join_follow(&self) -> Option<bool> {
        let handle = self.inner.task.lock().ok().and_then(|mut t| t.take())?;
        handle.await.ok()
    }

    /// Stop following, leave music mode and power the bulb off.
    pub async fn turn_off(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.request_stop();

        let handle = self.inner.task.lock().ok().and_then(|mut t| t.take());
        if let Some(mut handle) = handle {
            let grace = self.inner.config.sleep_interval + self.inner.config.device_timeout;
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                warn!(?grace, "follow loop did not stop in time, aborting it");
                handle.abort();
            }
        }

        self.shutdown_devices().await;
        debug!(name = %self.name(), "turned off");
    }

    /// Device side of turning off. Safe to call from the follow task itself.
    async fn shutdown_devices(&self) {
        let timeout = self.inner.config.device_timeout;
        let bulb = &self.inner.bulb;
        if let Err(e) = with_timeout("stop_music", timeout, bulb.stop_music()).await {
            warn!(error = %e, "failed to leave music mode");
        }
        if let Err(e) = with_timeout("turn_off", timeout, bulb.turn_off()).await {
            warn!(error = %e, "failed to power off the bulb");
        }
        self.with_state(|s| {
            s.is_on = false;
            s.lifecycle = Lifecycle::Off;
        });
    }

    // -----------------------------------------------------------------------
    // Follow loop
    // -----------------------------------------------------------------------

    /// Outer loop. Returns `false` if it ended through an implicit turn-off.
    async fn follow_tv(self) -> bool {
        info!(
            name = %self.name(),
            position = %self.inner.config.position,
            sleep = ?self.inner.config.sleep_interval,
            "following TV"
        );
        while self.is_following() {
            let cycle = AssertUnwindSafe(self.follow_cycle()).catch_unwind().await;
            if cycle.is_err() {
                error!(name = %self.name(), "follow loop crashed, turning off");
                self.request_stop();
                self.shutdown_devices().await;
                return false;
            }
        }
        debug!(name = %self.name(), "follow loop stopped");
        true
    }

    /// One outer iteration: refresh the configuration, run the inner loop.
    async fn follow_cycle(&self) -> u32 {
        let ambi = self.fetch_configuration().await;
        if ambi.is_none() {
            warn!("ambilight configuration unavailable, bulb will be dimmed");
        }
        self.follow_inner(ambi.as_ref()).await
    }

    /// Inner loop. Returns the number of iterations run.
    async fn follow_inner(&self, ambi: Option<&AmbilightConfiguration>) -> u32 {
        let cfg = &self.inner.config;
        let max = cfg.iterations_per_cycle();
        let mut layer_streak = FailureStreak::default();
        let mut push_streak = FailureStreak::default();
        let mut counter = 0;

        while self.is_following() && counter < max {
            let layer = self.fetch_layer(ambi).await;
            let rgb = sample(layer.as_ref(), cfg.position);
            match rgb {
                Some(_) => layer_streak.succeed("sample"),
                None => layer_streak.fail("sample"),
            }

            if push(&self.inner.bulb, rgb, ambi, cfg.device_timeout).await {
                push_streak.succeed("push");
            } else {
                push_streak.fail("push");
            }

            counter += 1;
            tokio::time::sleep(cfg.sleep_interval).await;
        }
        counter
    }

    async fn fetch_configuration(&self) -> Option<AmbilightConfiguration> {
        let timeout = self.inner.config.device_timeout;
        match with_timeout("ambilight configuration", timeout, self.inner.tv.ambilight_configuration()).await {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                warn!(error = %e, "failed to get ambilight settings");
                None
            }
        }
    }

    /// Measured values follow the raw picture; processed values include the
    /// TV's own effects (audio-following styles, manual colours).
    async fn fetch_layer(&self, ambi: Option<&AmbilightConfiguration>) -> Option<PixelLayer> {
        let ambi = ambi?;
        let timeout = self.inner.config.device_timeout;
        let layers = if ambi.follows_video() {
            with_timeout("ambilight measured", timeout, self.inner.tv.ambilight_measured()).await
        } else {
            with_timeout("ambilight processed", timeout, self.inner.tv.ambilight_processed()).await
        };
        match layers {
            Ok(l) => l.layer1,
            Err(e) => {
                debug!(error = %e, "failed to get ambilight layer");
                None
            }
        }
    }
}
