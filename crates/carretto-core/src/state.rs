//! Shared state between the concurrent activities
//!
//! Each value sits behind its own short-held lock. Callers only ever get a
//! copy out or hand a value in, so no guard can be held across an await point
//! or an I/O call.

use crate::clock::BeatState;
use crate::music::MusicalParameters;
use crate::spectrum::SpectrumFrame;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Parameters, beat state and spectrum shared by the control, clock and render tasks
#[derive(Debug, Default)]
pub struct SharedState {
    params: Mutex<MusicalParameters>,
    beat: Mutex<BeatState>,
    spectrum: Mutex<SpectrumFrame>,
}

impl SharedState {
    /// State with default parameters, no beat and a silent spectrum
    pub fn new() -> Self {
        Self::default()
    }

    /// Current parameters
    pub fn params(&self) -> MusicalParameters {
        *self.params.lock()
    }

    /// Publish new parameters
    pub fn set_params(&self, params: MusicalParameters) {
        *self.params.lock() = params;
    }

    /// Current beat state
    pub fn beat(&self) -> BeatState {
        *self.beat.lock()
    }

    /// Replace the beat state
    pub fn set_beat(&self, beat: BeatState) {
        *self.beat.lock() = beat;
    }

    /// Record a beat onset at `now`
    pub fn register_beat(&self, now: Instant) -> BeatState {
        let mut guard = self.beat.lock();
        guard.register_beat(now);
        *guard
    }

    /// Clear the beat flag once `window` has elapsed
    pub fn expire_beat(&self, now: Instant, window: Duration) -> bool {
        self.beat.lock().expire(now, window)
    }

    /// Current spectrum
    pub fn spectrum(&self) -> SpectrumFrame {
        self.spectrum.lock().clone()
    }

    /// Replace the spectrum
    pub fn set_spectrum(&self, frame: SpectrumFrame) {
        *self.spectrum.lock() = frame;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_defaults() {
        let state = SharedState::new();
        assert_eq!(state.params(), MusicalParameters::default());
        assert!(!state.beat().beat_active);
        assert!(state.spectrum().is_silent());
    }

    #[test]
    fn test_beat_register_and_expire() {
        let state = SharedState::new();
        let t0 = Instant::now();
        let beat = state.register_beat(t0);
        assert!(beat.beat_active);
        assert_eq!(beat.beat_counter, 1);
        assert!(!state.expire_beat(t0 + Duration::from_millis(50), Duration::from_millis(100)));
        assert!(state.expire_beat(t0 + Duration::from_millis(100), Duration::from_millis(100)));
        assert!(!state.beat().beat_active);
        assert_eq!(state.beat().beat_counter, 1);
    }

    #[test]
    fn test_concurrent_writers() {
        let state = Arc::new(SharedState::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        state.register_beat(Instant::now());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(state.beat().beat_counter, 4000);
    }
}
