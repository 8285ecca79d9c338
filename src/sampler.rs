//! Reduce an ambilight pixel layer to one colour.
//!
//! Each [`Position`] maps to a [`Policy`]: which pixels to read and how
//! to combine them. All positions go through the same evaluator,
//! [`sample`].
//!
//! Corner selections follow the TV's pixel numbering: the left edge is
//! numbered bottom-to-top and the right edge top-to-bottom, so
//! `left-top` is the *last* left pixel and `right-top` the *first*
//! right pixel.

use std::str::FromStr;

use crate::color::Rgb;
use crate::error::AmbiError;
use crate::tv::types::{Edge, PixelLayer};

/// Where on an edge a single pixel is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    First,
    /// `floor(n / 2)`
    Middle,
    /// `floor(n / 2) - 1`, saturating at 0.
    BeforeMiddle,
    Last,
}

impl Index {
    /// Resolve against an edge of `len` pixels. `None` when `len == 0`.
    pub fn resolve(self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(match self {
            Index::First => 0,
            Index::Middle => len / 2,
            Index::BeforeMiddle => (len / 2).saturating_sub(1),
            Index::Last => len - 1,
        })
    }
}

/// One pixel reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tap {
    pub edge: Edge,
    pub index: Index,
}

impl Tap {
    fn read(self, layer: &PixelLayer) -> Option<&Rgb> {
        let pixels = layer.edge(self.edge)?;
        let i = self.index.resolve(pixels.len())?;
        pixels.get(&i.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Specific pixels.
    Taps(&'static [Tap]),
    /// Every pixel of one edge, `"0"` through `"n-1"`.
    Whole(Edge),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Take the first selected pixel as-is.
    Raw,
    /// Per-channel `floor(sqrt(sum(c^2) / n))`.
    QuadraticMean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub selection: Selection,
    pub reduction: Reduction,
}

const fn raw(taps: &'static [Tap]) -> Policy {
    Policy {
        selection: Selection::Taps(taps),
        reduction: Reduction::Raw,
    }
}

const fn mean(taps: &'static [Tap]) -> Policy {
    Policy {
        selection: Selection::Taps(taps),
        reduction: Reduction::QuadraticMean,
    }
}

const fn edge_mean(edge: Edge) -> Policy {
    Policy {
        selection: Selection::Whole(edge),
        reduction: Reduction::QuadraticMean,
    }
}

// Struct literal so `&[tap!(..)]` is promoted to `'static`.
macro_rules! tap {
    ($edge:ident, $index:ident) => {
        Tap {
            edge: $edge,
            index: $index,
        }
    };
}

use Edge::{Bottom, Left, Right, Top};
use Index::{BeforeMiddle, First, Last, Middle};

/// Sampling position, as named in configuration (`display_options`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    LeftTop,
    LeftBottom,
    RightTop,
    RightBottom,
    TopAverage,
    BottomAverage,
    LeftAverage,
    RightAverage,
    TopLeftAverage,
    TopRightAverage,
    BottomLeftAverage,
    BottomRightAverage,
    TopMiddleAverage,
}

/// Every accepted name. Aliases share a variant; the first name listed
/// for a variant is its canonical name.
const NAMES: &[(&str, Position)] = &[
    ("top", Position::Top),
    ("top-middle", Position::Top),
    ("top-center", Position::Top),
    ("bottom", Position::Bottom),
    ("bottom-middle", Position::Bottom),
    ("bottom-center", Position::Bottom),
    ("left", Position::Left),
    ("left-middle", Position::Left),
    ("left-center", Position::Left),
    ("right", Position::Right),
    ("right-middle", Position::Right),
    ("right-center", Position::Right),
    ("top-left", Position::TopLeft),
    ("top-right", Position::TopRight),
    ("bottom-left", Position::BottomLeft),
    ("bottom-right", Position::BottomRight),
    ("left-top", Position::LeftTop),
    ("left-bottom", Position::LeftBottom),
    ("right-top", Position::RightTop),
    ("right-bottom", Position::RightBottom),
    ("top-average", Position::TopAverage),
    ("bottom-average", Position::BottomAverage),
    ("left-average", Position::LeftAverage),
    ("right-average", Position::RightAverage),
    ("top-left-average", Position::TopLeftAverage),
    ("top-right-average", Position::TopRightAverage),
    ("bottom-left-average", Position::BottomLeftAverage),
    ("bottom-right-average", Position::BottomRightAverage),
    ("top-middle-average", Position::TopMiddleAverage),
];

impl Position {
    /// All accepted names, aliases included, in table order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        NAMES.iter().map(|(name, _)| *name)
    }

    pub fn name(self) -> &'static str {
        NAMES
            .iter()
            .find(|(_, p)| *p == self)
            .map(|(name, _)| *name)
            .unwrap_or("top")
    }

    pub fn policy(self) -> Policy {
        match self {
            Position::Top => raw(&[tap!(Top, Middle)]),
            Position::Bottom => raw(&[tap!(Bottom, Middle)]),
            Position::Left => raw(&[tap!(Left, Middle)]),
            Position::Right => raw(&[tap!(Right, Middle)]),
            Position::TopLeft => raw(&[tap!(Top, First)]),
            Position::TopRight => raw(&[tap!(Top, Last)]),
            Position::BottomLeft => raw(&[tap!(Bottom, First)]),
            Position::BottomRight => raw(&[tap!(Bottom, Last)]),
            Position::LeftTop => raw(&[tap!(Left, Last)]),
            Position::LeftBottom => raw(&[tap!(Left, First)]),
            Position::RightTop => raw(&[tap!(Right, First)]),
            Position::RightBottom => raw(&[tap!(Right, Last)]),
            Position::TopAverage => edge_mean(Top),
            Position::BottomAverage => edge_mean(Bottom),
            Position::LeftAverage => edge_mean(Left),
            Position::RightAverage => edge_mean(Right),
            Position::TopLeftAverage => mean(&[tap!(Left, Last), tap!(Top, First)]),
            Position::TopRightAverage => mean(&[tap!(Right, First), tap!(Top, Last)]),
            Position::BottomLeftAverage => mean(&[tap!(Left, First), tap!(Bottom, First)]),
            Position::BottomRightAverage => mean(&[tap!(Right, Last), tap!(Bottom, Last)]),
            Position::TopMiddleAverage => {
                mean(&[tap!(Top, BeforeMiddle), tap!(Top, Middle)])
            }
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::Top
    }
}

impl FromStr for Position {
    type Err = AmbiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        NAMES
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, p)| *p)
            .ok_or_else(|| {
                AmbiError::Config(format!(
                    "unknown display option '{wanted}' (expected one of: {})",
                    Position::names().collect::<Vec<_>>().join(", ")
                ))
            })
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reduce `layer` to one colour using `position`'s policy.
///
/// Returns `None` when the layer is absent, an edge it needs is missing
/// or empty, or a pixel key is missing.
pub fn sample(layer: Option<&PixelLayer>, position: Position) -> Option<Rgb> {
    let layer = layer?;
    let policy = position.policy();

    let pixels: Vec<&Rgb> = match policy.selection {
        Selection::Taps(taps) => taps
            .iter()
            .map(|tap| tap.read(layer))
            .collect::<Option<Vec<_>>>()?,
        Selection::Whole(edge) => {
            let edge = layer.edge(edge)?;
            (0..edge.len())
                .map(|i| edge.get(&i.to_string()))
                .collect::<Option<Vec<_>>>()?
        }
    };

    match policy.reduction {
        Reduction::Raw => pixels.first().map(|p| **p),
        Reduction::QuadraticMean => Rgb::quadratic_mean(pixels),
    }
}
