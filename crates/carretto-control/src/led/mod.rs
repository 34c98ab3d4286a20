//! Pixel strip output
//!
//! Two independently addressed strips, each exposing "set color at index" and
//! "flush". Colors written by effects are full scale; global brightness and
//! wire color order belong to the output adapter.

pub mod artnet;

pub use artnet::{build_artnet_packet, ArtNetStrip, PIXELS_PER_UNIVERSE};

use crate::{error::ControlError, Result};
use carretto_core::config::{LedConfig, LedDriverKind};
use carretto_core::Rgb;
use std::fmt;
use tracing::{error, info};

/// Which of the two strips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StripSide {
    A,
    B,
}

impl StripSide {
    pub const BOTH: [StripSide; 2] = [StripSide::A, StripSide::B];
}

impl fmt::Display for StripSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StripSide::A => f.write_str("A"),
            StripSide::B => f.write_str("B"),
        }
    }
}

/// Addressable linear pixel strip
pub trait PixelStrip: Send {
    /// Number of pixels
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stage a color; takes effect on the next flush
    fn set_pixel(&mut self, index: usize, color: Rgb) -> Result<()>;

    /// Push staged colors to the hardware
    fn flush(&mut self) -> Result<()>;

    /// Colors as of the last flush
    fn shown(&self) -> &[Rgb];

    /// Stage all pixels off
    fn clear(&mut self) -> Result<()> {
        for i in 0..self.len() {
            self.set_pixel(i, Rgb::OFF)?;
        }
        Ok(())
    }

    /// Stage every pixel from `colors`
    fn write_all(&mut self, colors: &[Rgb]) -> Result<()> {
        for (i, color) in colors.iter().enumerate().take(self.len()) {
            self.set_pixel(i, *color)?;
        }
        Ok(())
    }
}

pub(crate) fn out_of_range(index: usize, len: usize) -> ControlError {
    ControlError::LedError(format!("Pixel {} out of range (strip has {})", index, len))
}

/// In-memory strip for headless runs and tests
#[derive(Debug, Clone)]
pub struct MemoryStrip {
    staged: Vec<Rgb>,
    shown: Vec<Rgb>,
    flushes: u64,
}

impl MemoryStrip {
    pub fn new(len: usize) -> Self {
        Self {
            staged: vec![Rgb::OFF; len],
            shown: vec![Rgb::OFF; len],
            flushes: 0,
        }
    }

    /// Number of flushes so far
    pub fn flushes(&self) -> u64 {
        self.flushes
    }
}

impl PixelStrip for MemoryStrip {
    fn len(&self) -> usize {
        self.staged.len()
    }

    fn set_pixel(&mut self, index: usize, color: Rgb) -> Result<()> {
        let len = self.staged.len();
        let pixel = self
            .staged
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, len))?;
        *pixel = color;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.shown.copy_from_slice(&self.staged);
        self.flushes += 1;
        Ok(())
    }

    fn shown(&self) -> &[Rgb] {
        &self.shown
    }
}

/// The two strips plus whether the configured driver could not be opened
pub struct StripPair {
    pub a: Box<dyn PixelStrip>,
    pub b: Box<dyn PixelStrip>,
    /// True when the configured hardware failed and memory strips stand in
    pub degraded: bool,
}

/// Open both strips for the configured driver, falling back to memory strips
pub fn open_strips(config: &LedConfig) -> StripPair {
    let len = config.strip_length;
    let memory = |degraded| StripPair {
        a: Box::new(MemoryStrip::new(len)),
        b: Box::new(MemoryStrip::new(len)),
        degraded,
    };

    match config.driver {
        LedDriverKind::Memory => {
            info!(len, "Using in-memory LED strips");
            memory(false)
        }
        LedDriverKind::ArtNet => {
            let open = |universe| {
                ArtNetStrip::new(
                    config.artnet_target,
                    universe,
                    len,
                    config.color_order,
                    config.brightness,
                )
            };
            match (open(config.universe_a), open(config.universe_b)) {
                (Ok(a), Ok(b)) => StripPair {
                    a: Box::new(a),
                    b: Box::new(b),
                    degraded: false,
                },
                (Err(e), _) | (_, Err(e)) => {
                    error!("LED output unavailable ({}), running DEGRADED without lights", e);
                    memory(true)
                }
            }
        }
    }
}
