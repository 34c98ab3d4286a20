//! Level-driven effects: spectrum bars and the volume meter

use super::{FrameContext, StripEffect};
use crate::error::ControlError;
use crate::led::StripSide;
use crate::Result;
use carretto_core::{Rgb, VisualizationMode};

/// The strip split into one bar per band, each lit in proportion to the band
/// and dimming towards its tip. Strip B maps the bands in reverse order.
pub struct SpectrumEffect;

impl StripEffect for SpectrumEffect {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Spectrum
    }

    fn render(&self, ctx: &FrameContext, side: StripSide, out: &mut [Rgb]) -> Result<()> {
        let bands = ctx.spectrum.bands();
        if bands.is_empty() {
            return Err(ControlError::EffectError(
                "Spectrum frame has no bands".to_string(),
            ));
        }

        let len = out.len();
        let per_band = (len / bands.len()).max(1);
        out.fill(Rgb::OFF);

        for (band, level) in bands.iter().enumerate() {
            let slot = match side {
                StripSide::A => band,
                StripSide::B => bands.len() - 1 - band,
            };
            let start = slot * per_band;
            let lit = (per_band as f32 * level) as usize;
            for j in 0..lit.min(per_band) {
                let Some(pixel) = out.get_mut(start + j) else {
                    break;
                };
                let falloff = 1.0 - 0.5 * j as f32 / lit.max(1) as f32;
                *pixel = ctx.color.scale(level * falloff);
            }
        }
        Ok(())
    }
}

/// Volume meter. Strip A grows outward from the centre, strip B inward from
/// both ends; each is brightest where it starts growing.
pub struct ReactiveEffect;

impl ReactiveEffect {
    /// Distance of `index` from the strip centre, 0 at the centre and 1 at the ends
    fn distance(index: usize, len: usize) -> f32 {
        let mid = (len / 2) as f32;
        let half = (len / 2).max(1) as f32;
        ((index as f32 - mid).abs() / half).min(1.0)
    }
}

impl StripEffect for ReactiveEffect {
    fn mode(&self) -> VisualizationMode {
        VisualizationMode::Reactive
    }

    fn render(&self, ctx: &FrameContext, side: StripSide, out: &mut [Rgb]) -> Result<()> {
        let len = out.len();
        let volume = ctx.volume;
        for (i, pixel) in out.iter_mut().enumerate() {
            let d = Self::distance(i, len);
            let reach = match side {
                StripSide::A => d,
                StripSide::B => 1.0 - d,
            };
            *pixel = if volume > 0.0 && reach <= volume {
                ctx.color.scale(1.0 - reach)
            } else {
                Rgb::OFF
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{ctx, render};
    use super::*;
    use carretto_core::SpectrumFrame;

    #[test]
    fn test_spectrum_bars() {
        let s = SpectrumFrame::external(vec![1.0, 0.5, 0.0, 0.25]);
        let c = ctx(&s, 120, None, false, 0);
        // 4 px per band, 2 spare px at the end
        let a = render(&SpectrumEffect, &c, StripSide::A, 18);

        let lit: Vec<bool> = a.iter().map(|p| !p.is_off()).collect();
        assert_eq!(
            lit,
            vec![
                true, true, true, true, // 1.0
                true, true, false, false, // 0.5
                false, false, false, false, // 0.0
                true, false, false, false, // 0.25
                false, false,
            ]
        );
        // Full band dims towards its tip
        assert_eq!(a[0], Rgb::new(200, 100, 50));
        assert_eq!(a[2], Rgb::new(150, 75, 37));
        assert_eq!(a[4], Rgb::new(100, 50, 25));
    }

    #[test]
    fn test_spectrum_reversed_on_b() {
        let s = SpectrumFrame::external(vec![1.0, 0.0]);
        let c = ctx(&s, 120, None, false, 0);
        let b = render(&SpectrumEffect, &c, StripSide::B, 4);
        assert!(b[0].is_off() && b[1].is_off());
        assert!(!b[2].is_off() && !b[3].is_off());
    }

    #[test]
    fn test_spectrum_more_bands_than_pixels() {
        let s = SpectrumFrame::external(vec![1.0; 16]);
        let c = ctx(&s, 120, None, false, 0);
        for side in StripSide::BOTH {
            let out = render(&SpectrumEffect, &c, side, 5);
            assert!(out.iter().all(|p| !p.is_off()));
        }
    }

    #[test]
    fn test_spectrum_without_bands_fails() {
        let s = SpectrumFrame::synthesized(Vec::new());
        let c = ctx(&s, 120, None, false, 0);
        let mut out = vec![Rgb::OFF; 4];
        assert!(matches!(
            SpectrumEffect.render(&c, StripSide::A, &mut out),
            Err(ControlError::EffectError(_))
        ));
    }

    #[test]
    fn test_reactive_grows_from_centre() {
        let s = SpectrumFrame::silent();
        let mut c = ctx(&s, 120, None, false, 0);
        c.volume = 0.5;
        let a = render(&ReactiveEffect, &c, StripSide::A, 10);
        let b = render(&ReactiveEffect, &c, StripSide::B, 10);

        let lit = |v: &[Rgb]| v.iter().map(|p| !p.is_off()).collect::<Vec<_>>();
        // centre 5, half 5: distances 1.0 .8 .6 .4 .2 0 .2 .4 .6 .8
        assert_eq!(
            lit(&a),
            vec![false, false, false, true, true, true, true, true, false, false]
        );
        assert_eq!(a[5], Rgb::new(200, 100, 50));
        assert_eq!(
            lit(&b),
            vec![true, true, true, false, false, false, false, false, true, true]
        );
        assert_eq!(b[0], Rgb::new(200, 100, 50));
    }

    #[test]
    fn test_reactive_silent_is_dark() {
        let s = SpectrumFrame::silent();
        let mut c = ctx(&s, 120, None, false, 0);
        c.volume = 0.0;
        for side in StripSide::BOTH {
            assert!(render(&ReactiveEffect, &c, side, 10).iter().all(|p| p.is_off()));
        }
    }
}
