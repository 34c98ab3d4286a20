//! Beat-locked effects: pulse, flash, blocks

use super::{FrameContext, StripEffect, FLASH_FLOOR};
use crate::led::StripSide;
use crate::Result;
use carretto_core::{Rgb, VisualizationMode};
use std::f32::consts::PI;

/// Whole strip follows a cosine of beat phase: full at onset, half at period end
pub struct PulseEffect;

impl StripEffect for PulseEffect {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Pulse
    }

    fn render(&self, ctx: &FrameContext, _side: StripSide, out: &mut [Rgb]) -> Result<()> {
        let intensity = 0.75 + 0.25 * (PI * ctx.phase()).cos();
        out.fill(ctx.color.scale(intensity));
        Ok(())
    }
}

/// Full color while the beat is active, dark once the window closes, then
/// swelling quadratically as the next beat nears; off below the floor
pub struct FlashEffect;

impl FlashEffect {
    pub fn intensity(ctx: &FrameContext) -> f32 {
        if ctx.beat.beat_active {
            return 1.0;
        }
        let rising = ctx.phase_after_window();
        let intensity = rising * rising;
        if intensity < FLASH_FLOOR {
            0.0
        } else {
            intensity
        }
    }
}

impl StripEffect for FlashEffect {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Flash
    }

    fn render(&self, ctx: &FrameContext, _side: StripSide, out: &mut [Rgb]) -> Result<()> {
        let intensity = Self::intensity(ctx);
        let color = if intensity <= 0.0 {
            Rgb::OFF
        } else {
            ctx.color.scale(intensity)
        };
        out.fill(color);
        Ok(())
    }
}

/// Alternating blocks; the count follows tempo and the parity flips every beat
pub struct BlocksEffect;

impl BlocksEffect {
    pub fn block_count(tempo_bpm: u16) -> usize {
        ((tempo_bpm / 30) as usize).max(2)
    }
}

impl StripEffect for BlocksEffect {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Blocks
    }

    fn render(&self, ctx: &FrameContext, side: StripSide, out: &mut [Rgb]) -> Result<()> {
        let blocks = Self::block_count(ctx.tempo_bpm);
        let size = (out.len() / blocks).max(1);
        let even_beat = ctx.beat.beat_counter % 2 == 0;

        out.fill(Rgb::OFF);
        for block in 0..blocks {
            let odd_block = block % 2 == 1;
            let lit = match side {
                StripSide::A => odd_block == even_beat,
                StripSide::B => odd_block != even_beat,
            };
            if !lit {
                continue;
            }
            let start = (block * size).min(out.len());
            let end = (start + size).min(out.len());
            out[start..end].fill(ctx.color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{ctx, render};
    use super::*;
    use carretto_core::SpectrumFrame;
    use std::time::Duration;

    #[test]
    fn test_pulse_curve() {
        let s = SpectrumFrame::silent();
        let onset = render(&PulseEffect, &ctx(&s, 120, Some(Duration::ZERO), true, 1), StripSide::A, 4);
        assert!(onset.iter().all(|c| *c == Rgb::new(200, 100, 50)));

        let end = render(&PulseEffect, &ctx(&s, 120, Some(Duration::from_millis(500)), false, 1), StripSide::B, 4);
        assert!(end.iter().all(|c| *c == Rgb::new(100, 50, 25)));
    }

    #[test]
    fn test_flash_scenario() {
        let s = SpectrumFrame::silent();
        let color = Rgb::new(200, 100, 50);

        let active = ctx(&s, 120, Some(Duration::from_millis(20)), true, 1);
        for side in StripSide::BOTH {
            assert!(render(&FlashEffect, &active, side, 30).iter().all(|c| *c == color));
        }

        for bpm in [60, 120, 180] {
            let after = ctx(&s, bpm, Some(Duration::from_millis(100)), false, 1);
            assert_eq!(FlashEffect::intensity(&after), 0.0, "{} bpm", bpm);
            for side in StripSide::BOTH {
                assert!(render(&FlashEffect, &after, side, 30).iter().all(|c| c.is_off()));
            }
        }
    }

    #[test]
    fn test_flash_dark_just_after_window_at_fast_tempo() {
        let s = SpectrumFrame::silent();
        // 180 BPM: 233 ms from window end to the next beat
        let c = ctx(&s, 180, Some(Duration::from_millis(140)), false, 1);
        assert!(render(&FlashEffect, &c, StripSide::A, 4).iter().all(|c| c.is_off()));
    }

    #[test]
    fn test_flash_swells_towards_next_beat() {
        let s = SpectrumFrame::silent();
        let late = ctx(&s, 120, Some(Duration::from_millis(460)), false, 1);
        let i = FlashEffect::intensity(&late);
        assert!((i - 0.81).abs() < 1e-3);
        assert!(!render(&FlashEffect, &late, StripSide::A, 3)[0].is_off());

        let fast = ctx(&s, 180, Some(Duration::from_millis(320)), false, 1);
        assert!(FlashEffect::intensity(&fast) > 0.8);
    }

    #[test]
    fn test_blocks_alternate_and_flip() {
        let s = SpectrumFrame::silent();
        // 120 bpm -> 4 blocks of 3 on a 12 px strip
        let even = ctx(&s, 120, None, false, 2);
        let a = render(&BlocksEffect, &even, StripSide::A, 12);
        let b = render(&BlocksEffect, &even, StripSide::B, 12);
        let lit = |v: &[Rgb]| v.iter().map(|c| !c.is_off()).collect::<Vec<_>>();
        assert_eq!(
            lit(&a),
            vec![false, false, false, true, true, true, false, false, false, true, true, true]
        );
        assert_eq!(
            lit(&b),
            lit(&a).iter().map(|x| !x).collect::<Vec<_>>()
        );

        let odd = ctx(&s, 120, None, false, 3);
        assert_eq!(lit(&render(&BlocksEffect, &odd, StripSide::A, 12)), lit(&b));
    }

    #[test]
    fn test_blocks_remainder_off() {
        let s = SpectrumFrame::silent();
        // 60 bpm -> 2 blocks of 2 on a 5 px strip, last pixel unused
        let c = ctx(&s, 60, None, false, 0);
        for side in StripSide::BOTH {
            assert!(render(&BlocksEffect, &c, side, 5)[4].is_off());
        }
        assert_eq!(BlocksEffect::block_count(180), 6);
    }

    #[test]
    fn test_blocks_tiny_strip() {
        let s = SpectrumFrame::silent();
        let c = ctx(&s, 180, None, false, 0);
        let out = render(&BlocksEffect, &c, StripSide::A, 2);
        assert_eq!(out.len(), 2);
    }
}
