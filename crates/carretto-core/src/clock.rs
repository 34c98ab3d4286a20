//! Beat clock
//!
//! Tick-driven: the owner calls [`BeatClock::advance`] at a fine resolution
//! and reacts to the returned events. Each beat is scheduled one period after
//! the previous one using the tempo current at that moment, so tempo changes
//! take effect on the very next beat.

use crate::config::ClockConfig;
use crate::music::{clamp_bpm, MusicalParameters};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Clock lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClockState {
    /// Created, not started
    #[default]
    Idle,
    /// Emitting beats
    Running,
    /// Stopped; no further beats until restarted
    Stopped,
}

/// Event produced by [`BeatClock::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Beat onset
    Beat {
        /// Session beat counter after this beat
        counter: u64,
    },
    /// The beat window of the last beat closed
    BeatEnd,
    /// Fixed-rate telemetry tick
    Telemetry,
}

/// Beat state read by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BeatState {
    /// True for a short window after each beat
    pub beat_active: bool,
    /// Onset of the last beat
    pub last_beat_time: Option<Instant>,
    /// Beats since process start, never reset
    pub beat_counter: u64,
}

impl BeatState {
    /// Record a beat at `now`
    pub fn register_beat(&mut self, now: Instant) {
        self.beat_active = true;
        self.last_beat_time = Some(now);
        self.beat_counter += 1;
    }

    /// Clear `beat_active` once `window` has elapsed since the last beat.
    /// Returns true if the flag was cleared by this call.
    pub fn expire(&mut self, now: Instant, window: Duration) -> bool {
        if !self.beat_active {
            return false;
        }
        match self.last_beat_time {
            Some(t) if now.saturating_duration_since(t) >= window => {
                self.beat_active = false;
                true
            }
            Some(_) => false,
            None => {
                self.beat_active = false;
                true
            }
        }
    }

    /// Time since the last beat, if there was one
    pub fn time_since_beat(&self, now: Instant) -> Option<Duration> {
        self.last_beat_time
            .map(|t| now.saturating_duration_since(t))
    }
}

/// Tempo-following beat and telemetry clock
#[derive(Debug, Clone)]
pub struct BeatClock {
    state: ClockState,
    tempo_bpm: u16,
    beat_window: Duration,
    telemetry_period: Duration,
    started_at: Option<Instant>,
    last_scheduled: Option<Instant>,
    next_telemetry: Option<Instant>,
    beat: BeatState,
}

impl BeatClock {
    /// Create an idle clock
    pub fn new(config: &ClockConfig, tempo_bpm: u16) -> Self {
        Self {
            state: ClockState::Idle,
            tempo_bpm: clamp_bpm(tempo_bpm as i64),
            beat_window: config.beat_window(),
            telemetry_period: config.telemetry_period(),
            started_at: None,
            last_scheduled: None,
            next_telemetry: None,
            beat: BeatState::default(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Current tempo
    pub fn tempo(&self) -> u16 {
        self.tempo_bpm
    }

    /// Current beat state
    pub fn beat_state(&self) -> BeatState {
        self.beat
    }

    /// Length of one beat at the current tempo
    pub fn beat_period(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.tempo_bpm as f64)
    }

    /// Start emitting; the first beat is due immediately
    pub fn start(&mut self, now: Instant) {
        if self.state == ClockState::Running {
            return;
        }
        self.state = ClockState::Running;
        self.started_at = Some(now);
        self.last_scheduled = None;
        self.next_telemetry = Some(now);
        self.beat.beat_active = false;
        info!(bpm = self.tempo_bpm, "Beat clock started");
    }

    /// Stop emitting; the beat counter is kept
    pub fn stop(&mut self) {
        if self.state != ClockState::Running {
            return;
        }
        self.state = ClockState::Stopped;
        self.beat.beat_active = false;
        self.started_at = None;
        self.last_scheduled = None;
        self.next_telemetry = None;
        info!(beats = self.beat.beat_counter, "Beat clock stopped");
    }

    /// Change tempo; applies from the next beat
    pub fn set_tempo(&mut self, bpm: u16) {
        let bpm = clamp_bpm(bpm as i64);
        if bpm != self.tempo_bpm {
            debug!(from = self.tempo_bpm, to = bpm, "Tempo change");
            self.tempo_bpm = bpm;
        }
    }

    /// Follow the tempo of `params`
    pub fn follow(&mut self, params: &MusicalParameters) {
        self.set_tempo(params.tempo_bpm);
    }

    /// Advance to `now`, returning the events that became due
    pub fn advance(&mut self, now: Instant) -> Vec<ClockEvent> {
        let mut events = Vec::new();
        if self.state != ClockState::Running {
            return events;
        }

        if self.beat.expire(now, self.beat_window) {
            events.push(ClockEvent::BeatEnd);
        }

        if let Some(due) = self.next_beat_due() {
            if now >= due {
                let period = self.beat_period();
                // Re-anchor rather than burst when far behind
                let scheduled = if now.saturating_duration_since(due) > period {
                    now
                } else {
                    due
                };
                self.last_scheduled = Some(scheduled);
                self.beat.register_beat(now);
                events.push(ClockEvent::Beat {
                    counter: self.beat.beat_counter,
                });
            }
        }

        if let Some(due) = self.next_telemetry {
            if now >= due {
                let mut next = due + self.telemetry_period;
                if next <= now {
                    next = now + self.telemetry_period;
                }
                self.next_telemetry = Some(next);
                events.push(ClockEvent::Telemetry);
            }
        }

        events
    }

    fn next_beat_due(&self) -> Option<Instant> {
        match self.last_scheduled {
            Some(last) => Some(last + self.beat_period()),
            None => self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(bpm: u16) -> BeatClock {
        BeatClock::new(&ClockConfig::default(), bpm)
    }

    fn beats(events: &[ClockEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ClockEvent::Beat { .. }))
            .count()
    }

    #[test]
    fn test_idle_emits_nothing() {
        let mut c = clock(120);
        assert_eq!(c.state(), ClockState::Idle);
        assert!(c.advance(Instant::now()).is_empty());
    }

    #[test]
    fn test_first_beat_immediate() {
        let mut c = clock(120);
        let t0 = Instant::now();
        c.start(t0);
        let events = c.advance(t0);
        assert!(events.contains(&ClockEvent::Beat { counter: 1 }));
        assert!(events.contains(&ClockEvent::Telemetry));
        assert!(c.beat_state().beat_active);
    }

    #[test]
    fn test_beat_timing_at_120_bpm() {
        let mut c = clock(120);
        let t0 = Instant::now();
        let tick = Duration::from_millis(10);
        c.start(t0);

        let mut beat_times = Vec::new();
        let mut now = t0;
        while now <= t0 + Duration::from_secs(10) {
            let events = c.advance(now);
            if beats(&events) > 0 {
                beat_times.push(now);
            }
            let state = c.beat_state();
            let since = state.time_since_beat(now).unwrap();
            assert_eq!(state.beat_active, since < Duration::from_millis(100));
            now += tick;
        }

        assert_eq!(beat_times.len(), 21);
        for pair in beat_times.windows(2) {
            let interval = pair[1] - pair[0];
            assert!(interval >= Duration::from_millis(490));
            assert!(interval <= Duration::from_millis(510));
        }
    }

    #[test]
    fn test_telemetry_rate_independent_of_tempo() {
        for bpm in [60, 180] {
            let mut c = clock(bpm);
            let t0 = Instant::now();
            c.start(t0);
            let mut telemetry = 0;
            for i in 0..100 {
                let events = c.advance(t0 + Duration::from_millis(i * 10));
                telemetry += events.iter().filter(|e| **e == ClockEvent::Telemetry).count();
            }
            assert_eq!(telemetry, 10);
        }
    }

    #[test]
    fn test_tempo_change_applies_to_next_beat() {
        let mut c = clock(120);
        let t0 = Instant::now();
        c.start(t0);
        c.advance(t0);

        c.set_tempo(60);
        // Old period would fire at 500ms
        assert_eq!(beats(&c.advance(t0 + Duration::from_millis(500))), 0);
        assert_eq!(beats(&c.advance(t0 + Duration::from_millis(1000))), 1);
    }

    #[test]
    fn test_reanchor_when_far_behind() {
        let mut c = clock(120);
        let t0 = Instant::now();
        c.start(t0);
        c.advance(t0);

        // Stalled for 3 seconds: one beat, not six
        let late = t0 + Duration::from_secs(3);
        assert_eq!(beats(&c.advance(late)), 1);
        assert_eq!(beats(&c.advance(late + Duration::from_millis(10))), 0);
        assert_eq!(beats(&c.advance(late + Duration::from_millis(500))), 1);
    }

    #[test]
    fn test_stop_and_restart_keeps_counter() {
        let mut c = clock(120);
        let t0 = Instant::now();
        c.start(t0);
        c.advance(t0);
        c.advance(t0 + Duration::from_millis(500));
        assert_eq!(c.beat_state().beat_counter, 2);

        c.stop();
        assert_eq!(c.state(), ClockState::Stopped);
        assert!(!c.beat_state().beat_active);
        assert!(c.advance(t0 + Duration::from_secs(1)).is_empty());

        let t1 = t0 + Duration::from_secs(2);
        c.start(t1);
        c.advance(t1);
        assert_eq!(c.beat_state().beat_counter, 3);
    }

    #[test]
    fn test_tempo_clamped() {
        let mut c = clock(10);
        assert_eq!(c.tempo(), 60);
        c.set_tempo(500);
        assert_eq!(c.tempo(), 180);
    }

    #[test]
    fn test_beat_end_event() {
        let mut c = clock(120);
        let t0 = Instant::now();
        c.start(t0);
        c.advance(t0);
        assert!(!c.advance(t0 + Duration::from_millis(90)).contains(&ClockEvent::BeatEnd));
        assert!(c.advance(t0 + Duration::from_millis(100)).contains(&ClockEvent::BeatEnd));
    }
}
