//! Visualization modes
//!
//! Each mode is a pure function of the frame context and the strip it draws:
//! no effect keeps state between frames. Strip B always shows a complementary
//! layout of strip A rather than a copy.

mod beat;
mod level;
mod motion;

pub use beat::{BlocksEffect, FlashEffect, PulseEffect};
pub use level::{ReactiveEffect, SpectrumEffect};
pub use motion::{ChaseEffect, RainbowEffect, WaveEffect};

use crate::led::StripSide;
use crate::Result;
use carretto_core::{BeatState, Rgb, SpectrumFrame, VisualizationMode};
use std::time::{Duration, Instant};

/// Intensity below which a decaying flash snaps to off
pub const FLASH_FLOOR: f32 = 0.05;

/// Beat window assumed until the engine is told otherwise
pub const DEFAULT_BEAT_WINDOW: Duration = Duration::from_millis(100);

/// Inputs of one render tick
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    /// Tick instant, for beat phase
    pub now: Instant,
    /// Seconds since the engine started, for time-driven motion
    pub time: f64,
    pub beat: BeatState,
    /// How long a beat stays active after onset
    pub beat_window: Duration,
    pub tempo_bpm: u16,
    pub volume: f32,
    /// Genre color at full scale
    pub color: Rgb,
    pub spectrum: &'a SpectrumFrame,
}

impl FrameContext<'_> {
    /// Beat period in seconds
    pub fn beat_period(&self) -> f64 {
        60.0 / self.tempo_bpm.max(1) as f64
    }

    /// Fraction of the beat period elapsed since the last beat, `0.0..=1.0`
    ///
    /// Before the first beat the phase is 1.0.
    pub fn phase(&self) -> f32 {
        match self.beat.time_since_beat(self.now) {
            Some(since) => (since.as_secs_f64() / self.beat_period()).clamp(0.0, 1.0) as f32,
            None => 1.0,
        }
    }

    /// Fraction of the stretch between the end of the beat window and the
    /// next beat that has elapsed, `0.0..=1.0`; 1.0 before the first beat
    pub fn phase_after_window(&self) -> f32 {
        let Some(since) = self.beat.time_since_beat(self.now) else {
            return 1.0;
        };
        let span = self.beat_period() - self.beat_window.as_secs_f64();
        if span <= 0.0 {
            return 0.0;
        }
        let dark = since.saturating_sub(self.beat_window).as_secs_f64();
        (dark / span).clamp(0.0, 1.0) as f32
    }
}

/// One visualization mode
pub trait StripEffect: Send + Sync {
    fn mode(&self) -> VisualizationMode;

    /// Fill `out` (one entry per pixel) for `side`
    fn render(&self, ctx: &FrameContext, side: StripSide, out: &mut [Rgb]) -> Result<()>;
}

/// Effect implementing `mode`
pub fn effect_for(mode: VisualizationMode) -> &'static dyn StripEffect {
    match mode {
        VisualizationMode::Pulse => &PulseEffect,
        VisualizationMode::Spectrum => &SpectrumEffect,
        VisualizationMode::Chase => &ChaseEffect,
        VisualizationMode::Flash => &FlashEffect,
        VisualizationMode::Rainbow => &RainbowEffect,
        VisualizationMode::Blocks => &BlocksEffect,
        VisualizationMode::Wave => &WaveEffect,
        VisualizationMode::Reactive => &ReactiveEffect,
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Context with a beat `since_beat` ago at `bpm`
    pub fn ctx<'a>(
        spectrum: &'a SpectrumFrame,
        bpm: u16,
        since_beat: Option<Duration>,
        active: bool,
        counter: u64,
    ) -> FrameContext<'a> {
        let now = Instant::now() + Duration::from_secs(10);
        FrameContext {
            now,
            time: 0.0,
            beat: BeatState {
                beat_active: active,
                last_beat_time: since_beat.map(|d| now - d),
                beat_counter: counter,
            },
            beat_window: DEFAULT_BEAT_WINDOW,
            tempo_bpm: bpm,
            volume: 1.0,
            color: Rgb::new(200, 100, 50),
            spectrum,
        }
    }

    pub fn render(effect: &dyn StripEffect, ctx: &FrameContext, side: StripSide, len: usize) -> Vec<Rgb> {
        let mut out = vec![Rgb::new(1, 1, 1); len];
        effect.render(ctx, side, &mut out).unwrap();
        out
    }
}
