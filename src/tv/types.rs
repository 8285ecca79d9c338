//! JointSpace ambilight API types (mirror what the TV exposes).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::color::Rgb;

/// Ambilight style. Only `FOLLOW_VIDEO` changes behaviour here; every
/// other value is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StyleName {
    FollowVideo,
    FollowAudio,
    FollowColor,
    Lounge,
    Other(String),
}

impl From<String> for StyleName {
    fn from(s: String) -> Self {
        match s.as_str() {
            "FOLLOW_VIDEO" => StyleName::FollowVideo,
            "FOLLOW_AUDIO" => StyleName::FollowAudio,
            "FOLLOW_COLOR" => StyleName::FollowColor,
            "Lounge light" | "LOUNGE" => StyleName::Lounge,
            _ => StyleName::Other(s),
        }
    }
}

impl From<StyleName> for String {
    fn from(s: StyleName) -> Self {
        match s {
            StyleName::FollowVideo => "FOLLOW_VIDEO".into(),
            StyleName::FollowAudio => "FOLLOW_AUDIO".into(),
            StyleName::FollowColor => "FOLLOW_COLOR".into(),
            StyleName::Lounge => "Lounge light".into(),
            StyleName::Other(s) => s,
        }
    }
}

/// Picture/menu setting reported alongside the style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MenuSetting {
    Game,
    Standard,
    Natural,
    Vivid,
    Other(String),
}

impl From<String> for MenuSetting {
    fn from(s: String) -> Self {
        match s.as_str() {
            "GAME" => MenuSetting::Game,
            "STANDARD" => MenuSetting::Standard,
            "NATURAL" => MenuSetting::Natural,
            "VIVID" => MenuSetting::Vivid,
            _ => MenuSetting::Other(s),
        }
    }
}

impl From<MenuSetting> for String {
    fn from(m: MenuSetting) -> Self {
        match m {
            MenuSetting::Game => "GAME".into(),
            MenuSetting::Standard => "STANDARD".into(),
            MenuSetting::Natural => "NATURAL".into(),
            MenuSetting::Vivid => "VIVID".into(),
            MenuSetting::Other(s) => s,
        }
    }
}

/// Body of `GET ambilight/currentconfiguration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbilightConfiguration {
    #[serde(rename = "styleName")]
    pub style_name: StyleName,
    #[serde(rename = "menuSetting", default, skip_serializing_if = "Option::is_none")]
    pub menu_setting: Option<MenuSetting>,
    #[serde(rename = "isExpert", default)]
    pub is_expert: bool,
}

impl AmbilightConfiguration {
    pub fn follows_video(&self) -> bool {
        self.style_name == StyleName::FollowVideo
    }

    pub fn is_game_mode(&self) -> bool {
        self.menu_setting == Some(MenuSetting::Game)
    }
}

/// One side of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

impl Edge {
    pub fn as_str(self) -> &'static str {
        match self {
            Edge::Top => "top",
            Edge::Bottom => "bottom",
            Edge::Left => "left",
            Edge::Right => "right",
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixels of one edge, keyed by their position as a decimal string
/// (`"0"`, `"1"`, ...), exactly as the TV sends them.
pub type EdgePixels = BTreeMap<String, Rgb>;

/// `layer1` of a measured/processed response. Edges the TV does not
/// have (many sets lack a bottom strip) are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<EdgePixels>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<EdgePixels>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<EdgePixels>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<EdgePixels>,
}

impl PixelLayer {
    pub fn edge(&self, edge: Edge) -> Option<&EdgePixels> {
        match edge {
            Edge::Top => self.top.as_ref(),
            Edge::Bottom => self.bottom.as_ref(),
            Edge::Left => self.left.as_ref(),
            Edge::Right => self.right.as_ref(),
        }
    }

    /// Build a layer from ordered pixel lists, assigning `"0".."n-1"` keys.
    pub fn from_edges(
        top: Option<Vec<Rgb>>,
        bottom: Option<Vec<Rgb>>,
        left: Option<Vec<Rgb>>,
        right: Option<Vec<Rgb>>,
    ) -> Self {
        fn keyed(pixels: Vec<Rgb>) -> EdgePixels {
            pixels
                .into_iter()
                .enumerate()
                .map(|(i, p)| (i.to_string(), p))
                .collect()
        }
        Self {
            top: top.map(keyed),
            bottom: bottom.map(keyed),
            left: left.map(keyed),
            right: right.map(keyed),
        }
    }
}

/// Body of `GET ambilight/measured` and `GET ambilight/processed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbilightLayers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer1: Option<PixelLayer>,
}
