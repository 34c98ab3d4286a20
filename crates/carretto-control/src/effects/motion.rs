//! Time-driven effects: chase, rainbow, wave
//!
//! Speed scales with tempo, 120 BPM being the reference.

use super::{FrameContext, StripEffect};
use crate::led::StripSide;
use crate::Result;
use carretto_core::visual::wheel;
use carretto_core::{Rgb, VisualizationMode};
use std::f64::consts::PI;

/// Chase head speed at 120 BPM, pixels per second
const CHASE_PX_PER_SEC: f64 = 50.0;
/// Rainbow rotation at 120 BPM, wheel steps per second
const RAINBOW_STEPS_PER_SEC: f64 = 30.0;

fn tempo_scaled(ctx: &FrameContext, rate: f64) -> f64 {
    ctx.time * ctx.tempo_bpm as f64 / 120.0 * rate
}

/// A lit segment of a tenth of the strip moving along it with a fading tail.
/// Strip B runs the mirrored direction.
pub struct ChaseEffect;

impl ChaseEffect {
    pub fn head(ctx: &FrameContext, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (tempo_scaled(ctx, CHASE_PX_PER_SEC) as u64 % len as u64) as usize
    }
}

impl StripEffect for ChaseEffect {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Chase
    }

    fn render(&self, ctx: &FrameContext, side: StripSide, out: &mut [Rgb]) -> Result<()> {
        let len = out.len();
        if len == 0 {
            return Ok(());
        }
        let head = Self::head(ctx, len);
        let segment = (len / 10).max(1);

        for (i, pixel) in out.iter_mut().enumerate() {
            let distance = match side {
                StripSide::A => (i + len - head) % len,
                StripSide::B => (len - 1 - head + len - i) % len,
            };
            *pixel = if distance < segment {
                ctx.color.scale(1.0 - distance as f32 / segment as f32)
            } else {
                Rgb::OFF
            };
        }
        Ok(())
    }
}

/// Color wheel spread over the strip, rotating over time. Strip B is reversed.
pub struct RainbowEffect;

impl StripEffect for RainbowEffect {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Rainbow
    }

    fn render(&self, ctx: &FrameContext, side: StripSide, out: &mut [Rgb]) -> Result<()> {
        let len = out.len();
        let offset = (tempo_scaled(ctx, RAINBOW_STEPS_PER_SEC) as u64 % 256) as usize;
        for (i, pixel) in out.iter_mut().enumerate() {
            let pos = match side {
                StripSide::A => i + offset,
                StripSide::B => len - i + offset,
            };
            *pixel = wheel((pos % 256) as u8);
        }
        Ok(())
    }
}

/// Travelling sinusoid, two cycles across the strip, one per beat in time.
/// Strip B uses the cosine, a quarter cycle ahead.
pub struct WaveEffect;

impl WaveEffect {
    pub fn intensity(ctx: &FrameContext, side: StripSide, index: usize, len: usize) -> f32 {
        let speed = ctx.tempo_bpm as f64 / 60.0;
        let pos = index as f64 / len.max(1) as f64;
        let angle = 2.0 * PI * speed * ctx.time + 4.0 * PI * pos;
        let wave = match side {
            StripSide::A => angle.sin(),
            StripSide::B => angle.cos(),
        };
        (0.5 + 0.5 * wave) as f32
    }
}

impl StripEffect for WaveEffect {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Wave
    }

    fn render(&self, ctx: &FrameContext, side: StripSide, out: &mut [Rgb]) -> Result<()> {
        let len = out.len();
        for (i, pixel) in out.iter_mut().enumerate() {
            *pixel = ctx.color.scale(Self::intensity(ctx, side, i, len));
        }
        Ok(())
    }
}
