//! Effect engine: one full update of both strips per render tick
//!
//! The engine owns the strips. Parameter changes and feedback arrive as
//! [`RenderCommand`]s; beat and spectrum are read by the caller from shared
//! state and passed into [`EffectEngine::render_at`].

use crate::effects::{effect_for, FrameContext, StripEffect, DEFAULT_BEAT_WINDOW};
use crate::led::{PixelStrip, StripSide};
use crate::Result;
use carretto_core::{
    Genre, MusicalParameters, Palette, Rgb, SpectrumFrame, SpectrumSource, SpectrumSynth,
    VisualizationMode, SMOOTHING_ALPHA,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Input changes for the renderer
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Forwarded parameter set from the control loop
    Parameters(MusicalParameters),
    Genre(Genre),
    Tempo(u16),
    Volume(f32),
    /// Mode override, kept until the next genre change
    Mode(VisualizationMode),
    /// Blank the strips and stop rendering
    Pause,
    Resume,
}

/// Render counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Frames written to both strips
    pub frames: u64,
    /// Frames dropped because an effect failed
    pub skipped: u64,
    /// Flushes the output rejected
    pub output_errors: u64,
}

pub struct EffectEngine {
    strip_a: Box<dyn PixelStrip>,
    strip_b: Box<dyn PixelStrip>,
    palette: Palette,
    epoch: Instant,
    beat_window: Duration,
    genre: Genre,
    tempo_bpm: u16,
    volume: f32,
    mode: VisualizationMode,
    paused: bool,
    smoothed: SpectrumFrame,
    synth: SpectrumSynth,
    scratch_a: Vec<Rgb>,
    scratch_b: Vec<Rgb>,
    stats: EngineStats,
}

impl EffectEngine {
    /// Create an engine over two strips; `epoch` is tick time zero
    pub fn new(
        strip_a: Box<dyn PixelStrip>,
        strip_b: Box<dyn PixelStrip>,
        palette: Palette,
        epoch: Instant,
    ) -> Self {
        let params = MusicalParameters::default();
        let mode = palette.mode(params.genre);
        let scratch_a = vec![Rgb::OFF; strip_a.len()];
        let scratch_b = vec![Rgb::OFF; strip_b.len()];
        Self {
            strip_a,
            strip_b,
            palette,
            epoch,
            beat_window: DEFAULT_BEAT_WINDOW,
            genre: params.genre,
            tempo_bpm: params.tempo_bpm,
            volume: params.volume,
            mode,
            paused: false,
            smoothed: SpectrumFrame::silent(),
            synth: SpectrumSynth::new(),
            scratch_a,
            scratch_b,
            stats: EngineStats::default(),
        }
    }

    /// Use the clock's beat window for beat-locked effects
    pub fn with_beat_window(mut self, window: Duration) -> Self {
        self.beat_window = window;
        self
    }

    /// Apply one input change
    pub fn apply(&mut self, command: RenderCommand) -> Result<()> {
        match command {
            RenderCommand::Parameters(params) => {
                self.tempo_bpm = params.tempo_bpm;
                self.volume = params.volume;
                self.set_genre(params.genre);
            }
            RenderCommand::Genre(genre) => self.set_genre(genre),
            RenderCommand::Tempo(bpm) => self.tempo_bpm = bpm,
            RenderCommand::Volume(volume) => self.volume = volume,
            RenderCommand::Mode(mode) => self.set_mode(mode),
            RenderCommand::Pause => {
                if !self.paused {
                    info!("Rendering paused");
                    self.paused = true;
                    self.blank()?;
                }
            }
            RenderCommand::Resume => {
                if self.paused {
                    info!("Rendering resumed");
                    self.paused = false;
                }
            }
        }
        Ok(())
    }

    /// Switch genre; the mode follows the palette only when the genre changes
    pub fn set_genre(&mut self, genre: Genre) {
        if genre == self.genre {
            return;
        }
        self.genre = genre;
        let mode = self.palette.mode(genre);
        if mode != self.mode {
            info!("Genre {} -> mode {}", genre, mode);
        }
        self.mode = mode;
    }

    pub fn set_mode(&mut self, mode: VisualizationMode) {
        if mode != self.mode {
            info!("Mode override: {} -> {}", self.mode, mode);
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> VisualizationMode {
        self.mode
    }

    pub fn genre(&self) -> Genre {
        self.genre
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn strip(&self, side: StripSide) -> &dyn PixelStrip {
        match side {
            StripSide::A => self.strip_a.as_ref(),
            StripSide::B => self.strip_b.as_ref(),
        }
    }

    /// Spectrum the effects see this tick
    ///
    /// Locally synthesised frames are smoothed; a silent one is replaced by a
    /// generic spectrum first. Measured frames pass through unchanged.
    fn spectrum_for_tick(&mut self, incoming: &SpectrumFrame) -> SpectrumFrame {
        if incoming.source == SpectrumSource::External && !incoming.is_silent() {
            self.smoothed = incoming.clone();
            return incoming.clone();
        }
        let base = if incoming.is_silent() {
            self.synth.generate_generic()
        } else {
            incoming.clone()
        };
        self.smoothed = base.blend(&self.smoothed, SMOOTHING_ALPHA);
        self.smoothed.clone()
    }

    /// Render one frame to both strips and flush
    ///
    /// If the effect fails, nothing is written and the strips keep showing
    /// the previous frame.
    pub fn render_at(
        &mut self,
        now: Instant,
        beat: &carretto_core::BeatState,
        spectrum: &SpectrumFrame,
    ) -> Result<()> {
        self.render_effect(effect_for(self.mode), now, beat, spectrum)
    }

    fn render_effect(
        &mut self,
        effect: &dyn StripEffect,
        now: Instant,
        beat: &carretto_core::BeatState,
        spectrum: &SpectrumFrame,
    ) -> Result<()> {
        if self.paused {
            return Ok(());
        }

        let spectrum = self.spectrum_for_tick(spectrum);
        let ctx = FrameContext {
            now,
            time: now.saturating_duration_since(self.epoch).as_secs_f64(),
            beat: *beat,
            beat_window: self.beat_window,
            tempo_bpm: self.tempo_bpm,
            volume: self.volume,
            color: self.palette.color(self.genre),
            spectrum: &spectrum,
        };

        let rendered = effect
            .render(&ctx, StripSide::A, &mut self.scratch_a)
            .and_then(|_| effect.render(&ctx, StripSide::B, &mut self.scratch_b));
        if let Err(e) = rendered {
            self.stats.skipped += 1;
            warn!("Skipping {} frame: {}", effect.mode(), e);
            return Err(e);
        }

        let written = write_and_flush(self.strip_a.as_mut(), &self.scratch_a)
            .and_then(|_| write_and_flush(self.strip_b.as_mut(), &self.scratch_b));
        if let Err(e) = written {
            self.stats.output_errors += 1;
            return Err(e);
        }

        self.stats.frames += 1;
        Ok(())
    }

    /// Render at the current instant
    pub fn render(
        &mut self,
        beat: &carretto_core::BeatState,
        spectrum: &SpectrumFrame,
    ) -> Result<()> {
        self.render_at(Instant::now(), beat, spectrum)
    }

    /// All pixels off on both strips, flushed
    pub fn blank(&mut self) -> Result<()> {
        debug!("Blanking both strips");
        for strip in [self.strip_a.as_mut(), self.strip_b.as_mut()] {
            strip.clear()?;
            strip.flush()?;
        }
        Ok(())
    }
}

fn write_and_flush(strip: &mut dyn PixelStrip, colors: &[Rgb]) -> Result<()> {
    strip.write_all(colors)?;
    strip.flush()
}
