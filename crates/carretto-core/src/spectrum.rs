//! Spectrum frames and genre-shaped spectrum synthesis
//!
//! Without an audio analyser in the loop the control side synthesises a
//! plausible spectrum per genre. The synthesis engine may send a measured one
//! back, which replaces the synthesised frame for rendering.

use crate::music::Genre;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of bands in a synthesised frame
pub const SPECTRUM_BANDS: usize = 16;

/// Weight of the incoming frame in exponential smoothing
pub const SMOOTHING_ALPHA: f32 = 0.7;

/// Where a spectrum frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpectrumSource {
    /// Generated locally
    #[default]
    Synthesized,
    /// Received from the synthesis engine
    External,
}

/// Per-band loudness, each value in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    bands: Vec<f32>,
    /// Origin of the values
    pub source: SpectrumSource,
}

impl Default for SpectrumFrame {
    fn default() -> Self {
        Self::silent()
    }
}

impl SpectrumFrame {
    /// All bands at zero
    pub fn silent() -> Self {
        Self {
            bands: vec![0.0; SPECTRUM_BANDS],
            source: SpectrumSource::Synthesized,
        }
    }

    /// Locally generated frame
    pub fn synthesized(bands: Vec<f32>) -> Self {
        Self {
            bands: clamp_bands(bands),
            source: SpectrumSource::Synthesized,
        }
    }

    /// Frame received from outside; values are clamped, an empty list is silent
    pub fn external(bands: Vec<f32>) -> Self {
        let bands = if bands.is_empty() {
            vec![0.0; SPECTRUM_BANDS]
        } else {
            clamp_bands(bands)
        };
        Self {
            bands,
            source: SpectrumSource::External,
        }
    }

    /// Band values
    pub fn bands(&self) -> &[f32] {
        &self.bands
    }

    /// Number of bands
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// True when there are no bands
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// True when every band is zero
    pub fn is_silent(&self) -> bool {
        self.bands.iter().all(|v| *v == 0.0)
    }

    /// Exponential smoothing: `alpha * self + (1 - alpha) * previous`
    ///
    /// Band counts that differ from `previous` are not blended.
    pub fn blend(&self, previous: &SpectrumFrame, alpha: f32) -> SpectrumFrame {
        if previous.len() != self.len() {
            return self.clone();
        }
        let bands = self
            .bands
            .iter()
            .zip(&previous.bands)
            .map(|(new, old)| alpha * new + (1.0 - alpha) * old)
            .collect();
        SpectrumFrame {
            bands,
            source: self.source,
        }
    }
}

fn clamp_bands(bands: Vec<f32>) -> Vec<f32> {
    bands
        .into_iter()
        .map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) })
        .collect()
}

/// Genre-shaped random spectrum generator
#[derive(Debug)]
pub struct SpectrumSynth {
    rng: StdRng,
}

impl Default for SpectrumSynth {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumSynth {
    /// Generator seeded from the OS
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic generator
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Frame shaped for `genre`, scaled by `volume`
    pub fn generate(&mut self, genre: Genre, volume: f32) -> SpectrumFrame {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        let bands = (0..SPECTRUM_BANDS)
            .map(|band| self.band_value(genre, band) * volume)
            .collect();
        SpectrumFrame::synthesized(bands)
    }

    /// Genre-neutral frame at full scale
    pub fn generate_generic(&mut self) -> SpectrumFrame {
        let bands = (0..SPECTRUM_BANDS)
            .map(|band| self.generic_band(band))
            .collect();
        SpectrumFrame::synthesized(bands)
    }

    fn band_value(&mut self, genre: Genre, band: usize) -> f32 {
        let n = SPECTRUM_BANDS;
        match genre {
            // Peaks at both ends
            Genre::Techno => {
                if band < 3 || band > n - 3 {
                    self.rng.random_range(0.7..=1.0)
                } else {
                    self.rng.random_range(0.3..=0.6)
                }
            }
            // Heavy lows, intermittent highs
            Genre::DrumAndBass => {
                if band < 4 {
                    self.rng.random_range(0.8..=1.0)
                } else if band > n - 4 && self.rng.random_bool(0.5) {
                    self.rng.random_range(0.7..=0.9)
                } else {
                    self.rng.random_range(0.2..=0.5)
                }
            }
            Genre::Ambient => self.rng.random_range(0.3..=0.7),
            _ => self.generic_band(band),
        }
    }

    fn generic_band(&mut self, band: usize) -> f32 {
        let third = SPECTRUM_BANDS as f32 / 3.0;
        let band = band as f32;
        if band < third {
            self.rng.random_range(0.5..=1.0)
        } else if band < 2.0 * third {
            self.rng.random_range(0.3..=0.8)
        } else {
            self.rng.random_range(0.1..=0.5)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent() {
        let frame = SpectrumFrame::silent();
        assert_eq!(frame.len(), SPECTRUM_BANDS);
        assert!(frame.is_silent());
    }

    #[test]
    fn test_external_clamps() {
        let frame = SpectrumFrame::external(vec![-1.0, 0.5, 2.0, f32::NAN]);
        assert_eq!(frame.bands(), &[0.0, 0.5, 1.0, 0.0]);
        assert_eq!(frame.source, SpectrumSource::External);
        assert_eq!(SpectrumFrame::external(vec![]).len(), SPECTRUM_BANDS);
    }

    #[test]
    fn test_blend() {
        let prev = SpectrumFrame::synthesized(vec![0.0, 1.0]);
        let next = SpectrumFrame::synthesized(vec![1.0, 0.0]);
        let blended = next.blend(&prev, SMOOTHING_ALPHA);
        assert!((blended.bands()[0] - 0.7).abs() < 1e-6);
        assert!((blended.bands()[1] - 0.3).abs() < 1e-6);

        let other = SpectrumFrame::synthesized(vec![0.5; 3]);
        assert_eq!(other.blend(&prev, 0.7), other);
    }

    #[test]
    fn test_genre_shapes() {
        let mut synth = SpectrumSynth::with_seed(7);
        for _ in 0..50 {
            let techno = synth.generate(Genre::Techno, 1.0);
            for (i, v) in techno.bands().iter().enumerate() {
                if i < 3 || i > 13 {
                    assert!((0.7..=1.0).contains(v), "band {} = {}", i, v);
                } else {
                    assert!((0.3..=0.6).contains(v), "band {} = {}", i, v);
                }
            }

            let dnb = synth.generate(Genre::DrumAndBass, 1.0);
            for v in &dnb.bands()[..4] {
                assert!((0.8..=1.0).contains(v));
            }

            let ambient = synth.generate(Genre::Ambient, 1.0);
            assert!(ambient.bands().iter().all(|v| (0.3..=0.7).contains(v)));

            let dub = synth.generate(Genre::Dub, 1.0);
            assert!(dub.bands()[..6].iter().all(|v| (0.5..=1.0).contains(v)));
            assert!(dub.bands()[11..].iter().all(|v| (0.1..=0.5).contains(v)));
        }
    }

    #[test]
    fn test_volume_scales() {
        let mut synth = SpectrumSynth::with_seed(1);
        let frame = synth.generate(Genre::Reggae, 0.5);
        assert!(frame.bands().iter().all(|v| *v <= 0.5));
        let frame = synth.generate(Genre::Reggae, 0.0);
        assert!(frame.is_silent());
    }
}
