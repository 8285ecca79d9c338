//! Colour flows: the bulb's `start_cf` command.

use std::time::Duration;

use serde_json::{json, Value};

use crate::color::Rgb;

/// Shortest transition the bulb accepts.
pub const MIN_DURATION: Duration = Duration::from_millis(50);

/// What the bulb does once the flow has run `count` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    /// Return to the state before the flow started.
    Recover = 0,
    /// Keep the last transition's colour.
    Stay = 1,
    /// Switch off.
    Off = 2,
}

/// One colour step of a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub color: Rgb,
    pub duration: Duration,
    /// 1..=100
    pub brightness: u8,
}

impl Transition {
    /// Full-brightness step to `color` over `duration_ms`.
    pub fn rgb(color: Rgb, duration_ms: u64) -> Self {
        Self {
            color,
            duration: Duration::from_millis(duration_ms),
            brightness: 100,
        }
    }

    /// `duration,mode,value,brightness` with mode 1 (colour).
    fn expression(&self) -> String {
        let ms = self.duration.max(MIN_DURATION).as_millis();
        let brightness = self.brightness.clamp(1, 100);
        format!("{ms},1,{},{brightness}", self.color.to_u32())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    /// How many times the whole transition list runs. 0 loops forever.
    pub count: u32,
    pub action: FlowAction,
    pub transitions: Vec<Transition>,
}

impl Flow {
    /// A single transition that runs once and holds its colour.
    pub fn single(transition: Transition) -> Self {
        Self {
            count: 1,
            action: FlowAction::Stay,
            transitions: vec![transition],
        }
    }

    pub fn expression(&self) -> String {
        self.transitions
            .iter()
            .map(Transition::expression)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `start_cf` params. The bulb counts state changes, not passes.
    pub fn params(&self) -> Vec<Value> {
        let changes = self.count * self.transitions.len() as u32;
        vec![
            json!(changes),
            json!(self.action as u8),
            json!(self.expression()),
        ]
    }
}
