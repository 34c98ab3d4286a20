//! Musical parameter model
//!
//! [`MusicalParameters`] is the derived state that both the synthesis engine
//! and the LED renderer follow. Values are always inside their domain; the
//! constructors clamp instead of failing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest tempo the mapper produces
pub const MIN_BPM: u16 = 60;
/// Highest tempo the mapper produces
pub const MAX_BPM: u16 = 180;
/// Number of rhythmic pattern slots
pub const PATTERN_COUNT: u8 = 4;

/// Human readable names of the pattern slots, index = pattern index
pub const PATTERN_NAMES: [&str; PATTERN_COUNT as usize] =
    ["basic", "complex", "breakbeat", "minimal"];

/// Genre selected by the third potentiometer
///
/// Order matters: the genre knob indexes into [`Genre::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    /// Dub
    #[default]
    Dub,
    /// Techno
    Techno,
    /// Reggae
    Reggae,
    /// House
    House,
    /// Drum and bass
    DrumAndBass,
    /// Ambient
    Ambient,
    /// Trap
    Trap,
}

impl Genre {
    /// All genres in knob order
    pub const ALL: [Genre; 7] = [
        Genre::Dub,
        Genre::Techno,
        Genre::Reggae,
        Genre::House,
        Genre::DrumAndBass,
        Genre::Ambient,
        Genre::Trap,
    ];

    /// Number of genres
    pub const COUNT: usize = Self::ALL.len();

    /// Wire name, also used in config files
    pub fn name(self) -> &'static str {
        match self {
            Genre::Dub => "dub",
            Genre::Techno => "techno",
            Genre::Reggae => "reggae",
            Genre::House => "house",
            Genre::DrumAndBass => "drumandbass",
            Genre::Ambient => "ambient",
            Genre::Trap => "trap",
        }
    }

    /// Genre at `index`, clamped to the last genre
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::COUNT - 1)]
    }

    /// Position in [`Genre::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Genre {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Genre::ALL
            .into_iter()
            .find(|g| g.name() == lower)
            .ok_or_else(|| format!("Unknown genre: {}", s))
    }
}

/// Musical control values derived from the potentiometers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MusicalParameters {
    /// Output volume, `0.0..=1.0`
    pub volume: f32,
    /// Tempo in beats per minute, `60..=180`
    pub tempo_bpm: u16,
    /// Selected genre
    pub genre: Genre,
    /// Pattern slot, `0..=3`
    pub pattern_index: u8,
}

impl Default for MusicalParameters {
    fn default() -> Self {
        Self {
            volume: 0.8,
            tempo_bpm: 120,
            genre: Genre::default(),
            pattern_index: 0,
        }
    }
}

impl MusicalParameters {
    /// Build parameters, clamping every field into its domain
    pub fn new(volume: f32, tempo_bpm: u16, genre: Genre, pattern_index: u8) -> Self {
        Self {
            volume: clamp_volume(volume),
            tempo_bpm: clamp_bpm(tempo_bpm as i64),
            genre,
            pattern_index: pattern_index.min(PATTERN_COUNT - 1),
        }
    }

    /// Name of the current pattern slot
    pub fn pattern_name(&self) -> &'static str {
        PATTERN_NAMES[(self.pattern_index as usize).min(PATTERN_NAMES.len() - 1)]
    }

    /// Length of one beat at the current tempo, in seconds
    pub fn beat_period_secs(&self) -> f64 {
        60.0 / self.tempo_bpm.max(1) as f64
    }
}

/// Clamp a volume value, treating NaN as silence
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Clamp a tempo value into `[MIN_BPM, MAX_BPM]`
pub fn clamp_bpm(bpm: i64) -> u16 {
    bpm.clamp(MIN_BPM as i64, MAX_BPM as i64) as u16
}
