//! Visual model: colors, visualization modes and the genre palette

use crate::music::Genre;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 24-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Rgb {
    /// All channels off
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    /// Create a color
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale every channel by `intensity` (clamped to `[0, 1]`), truncating
    pub fn scale(self, intensity: f32) -> Self {
        let k = if intensity.is_nan() {
            0.0
        } else {
            intensity.clamp(0.0, 1.0)
        };
        let ch = |v: u8| (v as f32 * k) as u8;
        Self::new(ch(self.r), ch(self.g), ch(self.b))
    }

    /// True when every channel is zero
    pub fn is_off(self) -> bool {
        self == Self::OFF
    }

    /// Reorder channels for the wire
    pub fn to_order(self, order: ColorOrder) -> [u8; 3] {
        let Rgb { r, g, b } = self;
        match order {
            ColorOrder::Rgb => [r, g, b],
            ColorOrder::Rbg => [r, b, g],
            ColorOrder::Grb => [g, r, b],
            ColorOrder::Gbr => [g, b, r],
            ColorOrder::Brg => [b, r, g],
            ColorOrder::Bgr => [b, g, r],
        }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

/// Classic 0..255 color wheel: red to green, green to blue, blue back to red
pub fn wheel(pos: u8) -> Rgb {
    let pos = pos as u16;
    if pos < 85 {
        Rgb::new((pos * 3) as u8, (255 - pos * 3) as u8, 0)
    } else if pos < 170 {
        let p = pos - 85;
        Rgb::new((255 - p * 3) as u8, 0, (p * 3) as u8)
    } else {
        let p = pos - 170;
        Rgb::new(0, (p * 3) as u8, (255 - p * 3) as u8)
    }
}

/// Byte order expected by the pixel hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorOrder {
    /// Red, green, blue
    Rgb,
    /// Red, blue, green
    Rbg,
    /// Green, red, blue (WS2812)
    #[default]
    Grb,
    /// Green, blue, red
    Gbr,
    /// Blue, red, green
    Brg,
    /// Blue, green, red
    Bgr,
}

/// LED rendering algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationMode {
    /// Brightness follows a cosine of beat phase
    #[default]
    Pulse,
    /// Per-band bar graph
    Spectrum,
    /// Travelling lit segment
    Chase,
    /// Full flash on beat with quadratic decay
    Flash,
    /// Hue cycle along the strip
    Rainbow,
    /// Alternating blocks flipping each beat
    Blocks,
    /// Sinusoidal travelling wave
    Wave,
    /// Volume-driven lit region
    Reactive,
}

impl VisualizationMode {
    /// Every mode
    pub const ALL: [VisualizationMode; 8] = [
        VisualizationMode::Pulse,
        VisualizationMode::Spectrum,
        VisualizationMode::Chase,
        VisualizationMode::Flash,
        VisualizationMode::Rainbow,
        VisualizationMode::Blocks,
        VisualizationMode::Wave,
        VisualizationMode::Reactive,
    ];

    /// Wire name
    pub fn name(self) -> &'static str {
        match self {
            VisualizationMode::Pulse => "pulse",
            VisualizationMode::Spectrum => "spectrum",
            VisualizationMode::Chase => "chase",
            VisualizationMode::Flash => "flash",
            VisualizationMode::Rainbow => "rainbow",
            VisualizationMode::Blocks => "blocks",
            VisualizationMode::Wave => "wave",
            VisualizationMode::Reactive => "reactive",
        }
    }
}

impl fmt::Display for VisualizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisualizationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        VisualizationMode::ALL
            .into_iter()
            .find(|m| m.name() == lower)
            .ok_or_else(|| format!("Unknown visualization mode: {}", s))
    }
}

/// Color and default mode for one genre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreStyle {
    /// Genre this style applies to
    pub genre: Genre,
    /// Base color of every effect
    pub color: Rgb,
    /// Mode selected when the genre becomes active
    pub mode: VisualizationMode,
}

/// Genre to color and genre to mode lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// One entry per genre; genres without an entry use the built-in style
    pub styles: Vec<GenreStyle>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            styles: Genre::ALL.into_iter().map(default_style).collect(),
        }
    }
}

impl Palette {
    /// Style for `genre`
    pub fn style(&self, genre: Genre) -> GenreStyle {
        self.styles
            .iter()
            .find(|s| s.genre == genre)
            .copied()
            .unwrap_or_else(|| default_style(genre))
    }

    /// Base color for `genre`
    pub fn color(&self, genre: Genre) -> Rgb {
        self.style(genre).color
    }

    /// Mode selected by `genre`
    pub fn mode(&self, genre: Genre) -> VisualizationMode {
        self.style(genre).mode
    }
}

fn default_style(genre: Genre) -> GenreStyle {
    let (color, mode) = match genre {
        Genre::Dub => (Rgb::new(255, 165, 0), VisualizationMode::Blocks),
        Genre::Techno => (Rgb::new(255, 255, 255), VisualizationMode::Flash),
        Genre::Reggae => (Rgb::new(255, 255, 0), VisualizationMode::Rainbow),
        Genre::House => (Rgb::new(255, 0, 255), VisualizationMode::Chase),
        Genre::DrumAndBass => (Rgb::new(0, 0, 255), VisualizationMode::Spectrum),
        Genre::Ambient => (Rgb::new(0, 255, 255), VisualizationMode::Pulse),
        Genre::Trap => (Rgb::new(128, 0, 128), VisualizationMode::Wave),
    };
    GenreStyle { genre, color, mode }
}
