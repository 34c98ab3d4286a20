//! Simulated sensor input for running without the control surface
//!
//! Every frame is flagged `simulated` so it can never be mistaken for a
//! hardware reading.

use super::SensorSource;
use carretto_core::{Genre, RawFrame};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Drift step period
const STEP: Duration = Duration::from_millis(100);
/// Steps between genre changes
const GENRE_STEPS: u64 = 40;

/// Slowly drifting knob values
#[derive(Debug)]
pub struct SimulatedSource {
    step: u64,
    next_step: Option<Instant>,
    genre_index: usize,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSource {
    pub fn new() -> Self {
        info!("SIMULATED sensor input active");
        Self {
            step: 0,
            next_step: None,
            genre_index: 0,
        }
    }

    /// Knob values for the current step
    pub fn values(&self) -> [f32; 4] {
        let step = self.step as f32;
        let volume = 0.7 + 0.3 * ((step % 20.0) / 20.0);
        let tempo = 0.3 + 0.4 * ((step % 30.0) / 30.0);
        // Centre of the genre's slot on the knob
        let genre = (self.genre_index as f32 + 0.5) / Genre::COUNT as f32;
        [volume, tempo, genre, 0.5]
    }

    fn advance(&mut self) {
        self.step += 1;
        if self.step % GENRE_STEPS == 0 {
            self.genre_index = (self.genre_index + 1) % Genre::COUNT;
        }
        if self.step % 10 == 0 {
            debug!(step = self.step, values = ?self.values(), "Simulated sensor values");
        }
    }
}

impl SensorSource for SimulatedSource {
    fn poll_at(&mut self, now: Instant) -> Option<RawFrame> {
        if let Some(due) = self.next_step {
            if now < due {
                return None;
            }
            self.advance();
        }
        self.next_step = Some(now + STEP);

        let values = self.values();
        let mut raw = [0u8; 4];
        for (r, v) in raw.iter_mut().zip(values) {
            *r = (v.clamp(0.0, 1.0) * 255.0) as u8;
        }
        Some(RawFrame::simulated(raw, now))
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "simulated".to_string()
    }
}
