use serde::{Deserialize, Serialize};

/// Colour the bulb is set to whenever there is no usable picture data
/// (sampling failed, or the screen is black in game mode).
pub const DEFAULT_RGB: Rgb = Rgb::new(255, 255, 255);

/// One RGB sample. Also the wire shape of a single ambilight pixel
/// (`{"r": .., "g": .., "b": ..}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_black(&self) -> bool {
        *self == Self::BLACK
    }

    /// Packed `0xRRGGBB`, the integer form the bulb expects.
    pub fn to_u32(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    /// Per-channel quadratic mean `floor(sqrt(sum(c^2) / n))`.
    ///
    /// Returns `None` for an empty input.
    pub fn quadratic_mean<'a, I>(pixels: I) -> Option<Rgb>
    where
        I: IntoIterator<Item = &'a Rgb>,
    {
        let mut n: u64 = 0;
        let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
        for p in pixels {
            n += 1;
            r += u64::from(p.r).pow(2);
            g += u64::from(p.g).pow(2);
            b += u64::from(p.b).pow(2);
        }
        if n == 0 {
            return None;
        }
        let channel = |sum: u64| ((sum as f64 / n as f64).sqrt() as u64).min(255) as u8;
        Some(Rgb::new(channel(r), channel(g), channel(b)))
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}
