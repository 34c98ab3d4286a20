//! Potentiometer to musical parameter mapping
//!
//! Each channel is gated by its own threshold: a channel's value is adopted
//! (and the parameter it drives is forwarded) only when it moved at least the
//! threshold away from the last adopted value. A forced refresh re-adopts and
//! forwards everything on a fixed period so late-joining consumers converge.

use crate::config::MappingConfig;
use crate::music::{clamp_bpm, clamp_volume, Genre, MusicalParameters, PATTERN_COUNT};
use crate::sample::{Channel, NormalizedSample, CHANNEL_COUNT};
use std::time::{Duration, Instant};
use tracing::debug;

/// Float slack so a move of exactly the threshold forwards
const THRESHOLD_EPSILON: f32 = 1e-6;

/// Which parameters must be pushed downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeSet {
    /// Volume (pot1)
    pub volume: bool,
    /// Tempo (pot2)
    pub tempo: bool,
    /// Genre (pot3)
    pub genre: bool,
    /// Pattern (pot4)
    pub pattern: bool,
}

impl ChangeSet {
    /// Every parameter
    pub const ALL: ChangeSet = ChangeSet {
        volume: true,
        tempo: true,
        genre: true,
        pattern: true,
    };

    /// Nothing
    pub const NONE: ChangeSet = ChangeSet {
        volume: false,
        tempo: false,
        genre: false,
        pattern: false,
    };

    /// True if any parameter is flagged
    pub fn any(&self) -> bool {
        self.volume || self.tempo || self.genre || self.pattern
    }

    fn mark(&mut self, channel: Channel) {
        match channel {
            Channel::Pot1 => self.volume = true,
            Channel::Pot2 => self.tempo = true,
            Channel::Pot3 => self.genre = true,
            Channel::Pot4 => self.pattern = true,
        }
    }
}

/// Result of one mapping step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterUpdate {
    /// Published parameters after this step
    pub params: MusicalParameters,
    /// Parameters to forward
    pub changed: ChangeSet,
    /// True when this step was a forced refresh
    pub forced: bool,
}

impl ParameterUpdate {
    /// True if anything must be forwarded
    pub fn is_changed(&self) -> bool {
        self.changed.any()
    }
}

/// Volume from pot1
pub fn map_volume(value: f32) -> f32 {
    clamp_volume(value)
}

/// Tempo from pot2: `round(60 + v * 120)`
pub fn map_tempo(value: f32) -> u16 {
    let v = clamp_volume(value) as f64;
    clamp_bpm((60.0 + v * 120.0).round() as i64)
}

/// Genre from pot3: `floor(v * 7)`, clamped to the last genre
pub fn map_genre(value: f32) -> Genre {
    let v = clamp_volume(value);
    Genre::from_index((v * Genre::COUNT as f32).floor() as usize)
}

/// Pattern slot from pot4: `floor(v * 4)`, clamped to 3
pub fn map_pattern(value: f32) -> u8 {
    let v = clamp_volume(value);
    ((v * PATTERN_COUNT as f32).floor() as u8).min(PATTERN_COUNT - 1)
}

/// Change-gated mapper from normalized samples to [`MusicalParameters`]
#[derive(Debug, Clone)]
pub struct ParameterMapper {
    thresholds: [f32; CHANNEL_COUNT],
    forced_refresh: Duration,
    forwarded: [Option<f32>; CHANNEL_COUNT],
    last_refresh: Option<Instant>,
    params: MusicalParameters,
}

impl ParameterMapper {
    /// Create a mapper with the configured thresholds
    pub fn new(config: &MappingConfig) -> Self {
        let mut thresholds = [0.0; CHANNEL_COUNT];
        for channel in Channel::ALL {
            thresholds[channel.index()] = if channel.is_discrete() {
                config.discrete_threshold
            } else {
                config.continuous_threshold
            };
        }
        Self {
            thresholds,
            forced_refresh: config.forced_refresh(),
            forwarded: [None; CHANNEL_COUNT],
            last_refresh: None,
            params: MusicalParameters::default(),
        }
    }

    /// Currently published parameters
    pub fn params(&self) -> MusicalParameters {
        self.params
    }

    /// Threshold of one channel
    pub fn threshold(&self, channel: Channel) -> f32 {
        self.thresholds[channel.index()]
    }

    /// Map a sample using the wall clock
    pub fn map(&mut self, sample: &NormalizedSample) -> (MusicalParameters, bool) {
        let update = self.map_at(sample, Instant::now());
        (update.params, update.is_changed())
    }

    /// Map a sample at `now`
    pub fn map_at(&mut self, sample: &NormalizedSample, now: Instant) -> ParameterUpdate {
        let forced = self.refresh_due(now);
        let mut changed = ChangeSet::NONE;

        for channel in Channel::ALL {
            let i = channel.index();
            let value = sample.get(channel);
            let moved = match self.forwarded[i] {
                None => true,
                Some(prev) => (value - prev).abs() + THRESHOLD_EPSILON >= self.thresholds[i],
            };
            if moved || forced {
                self.forwarded[i] = Some(value);
            }
            if moved {
                changed.mark(channel);
            }
        }

        if forced {
            self.last_refresh = Some(now);
            changed = ChangeSet::ALL;
            debug!("Forced parameter refresh");
        }

        self.params = self.compute();
        ParameterUpdate {
            params: self.params,
            changed,
            forced,
        }
    }

    /// Forced refresh without a new sample, if the refresh period elapsed
    pub fn poll_refresh(&mut self, now: Instant) -> Option<ParameterUpdate> {
        if !self.refresh_due(now) {
            return None;
        }
        self.last_refresh = Some(now);
        debug!("Forced parameter refresh (no new sample)");
        Some(ParameterUpdate {
            params: self.params,
            changed: ChangeSet::ALL,
            forced: true,
        })
    }

    fn refresh_due(&mut self, now: Instant) -> bool {
        match self.last_refresh {
            None => {
                self.last_refresh = Some(now);
                false
            }
            Some(last) => now.saturating_duration_since(last) >= self.forced_refresh,
        }
    }

    fn compute(&self) -> MusicalParameters {
        let defaults = MusicalParameters::default();
        let value = |ch: Channel| self.forwarded[ch.index()];
        MusicalParameters {
            volume: value(Channel::Pot1).map_or(defaults.volume, map_volume),
            tempo_bpm: value(Channel::Pot2).map_or(defaults.tempo_bpm, map_tempo),
            genre: value(Channel::Pot3).map_or(defaults.genre, map_genre),
            pattern_index: value(Channel::Pot4).map_or(defaults.pattern_index, map_pattern),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> ParameterMapper {
        ParameterMapper::new(&MappingConfig::default())
    }

    fn sample(v: [f32; 4]) -> NormalizedSample {
        NormalizedSample::new(v)
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(map_tempo(0.0), 60);
        assert_eq!(map_tempo(1.0), 180);
        assert_eq!(map_tempo(0.5), 120);
        assert_eq!(map_pattern(0.0), 0);
        assert_eq!(map_pattern(1.0), 3);
        assert_eq!(map_pattern(0.74), 2);
        assert_eq!(map_genre(0.0), Genre::ALL[0]);
        assert_eq!(map_genre(1.0), Genre::Trap);
        assert_eq!(map_genre(0.999), Genre::Trap);
        assert_eq!(map_genre(0.15), Genre::Techno);
    }

    #[test]
    fn test_thresholds_per_channel() {
        let m = mapper();
        assert_eq!(m.threshold(Channel::Pot1), 0.05);
        assert_eq!(m.threshold(Channel::Pot2), 0.05);
        assert_eq!(m.threshold(Channel::Pot3), 0.015);
        assert_eq!(m.threshold(Channel::Pot4), 0.015);
    }

    #[test]
    fn test_first_sample_forwards_everything() {
        let mut m = mapper();
        let update = m.map_at(&sample([0.0, 1.0, 0.0, 0.0]), Instant::now());
        assert_eq!(update.changed, ChangeSet::ALL);
        assert!(!update.forced);
        assert_eq!(update.params.volume, 0.0);
        assert_eq!(update.params.tempo_bpm, 180);
    }

    #[test]
    fn test_idempotent() {
        let mut m = mapper();
        let s = sample([0.3, 0.4, 0.5, 0.6]);
        let (_, first) = m.map(&s);
        assert!(first);
        let (params, second) = m.map(&s);
        assert!(!second);
        assert_eq!(params, m.params());
    }

    #[test]
    fn test_exact_threshold_forwards() {
        let mut m = mapper();
        let t0 = Instant::now();
        m.map_at(&sample([0.5, 0.5, 0.5, 0.5]), t0);

        let update = m.map_at(&sample([0.55, 0.5, 0.515, 0.5]), t0);
        assert!(update.changed.volume);
        assert!(update.changed.genre);
        assert!(!update.changed.tempo);
        assert!(!update.changed.pattern);
    }

    #[test]
    fn test_sub_threshold_is_gated() {
        let mut m = mapper();
        let t0 = Instant::now();
        m.map_at(&sample([0.5, 0.5, 0.5, 0.5]), t0);

        let update = m.map_at(&sample([0.54, 0.46, 0.51, 0.49]), t0 + Duration::from_secs(1));
        assert!(!update.is_changed());
        // Published value stays at the last forwarded one
        assert_eq!(update.params.volume, 0.5);
    }

    #[test]
    fn test_slow_drift_accumulates_against_forwarded_value() {
        let mut m = mapper();
        let t0 = Instant::now();
        m.map_at(&sample([0.5, 0.5, 0.5, 0.5]), t0);
        assert!(!m.map_at(&sample([0.53, 0.5, 0.5, 0.5]), t0).changed.volume);
        assert!(m.map_at(&sample([0.56, 0.5, 0.5, 0.5]), t0).changed.volume);
    }

    #[test]
    fn test_forced_refresh_adopts_sub_threshold_values() {
        let mut m = mapper();
        let t0 = Instant::now();
        m.map_at(&sample([0.5, 0.5, 0.5, 0.5]), t0);

        let update = m.map_at(&sample([0.52, 0.5, 0.5, 0.5]), t0 + Duration::from_secs(10));
        assert!(update.forced);
        assert_eq!(update.changed, ChangeSet::ALL);
        assert!((update.params.volume - 0.52).abs() < 1e-6);

        // Timer restarted
        let update = m.map_at(&sample([0.52, 0.5, 0.5, 0.5]), t0 + Duration::from_secs(11));
        assert!(!update.is_changed());
    }

    #[test]
    fn test_poll_refresh() {
        let mut m = mapper();
        let t0 = Instant::now();
        m.map_at(&sample([0.1, 0.2, 0.3, 0.4]), t0);
        assert!(m.poll_refresh(t0 + Duration::from_secs(9)).is_none());
        let update = m.poll_refresh(t0 + Duration::from_secs(10)).unwrap();
        assert!(update.forced);
        assert_eq!(update.params, m.params());
        assert!(m.poll_refresh(t0 + Duration::from_secs(11)).is_none());
    }

    #[test]
    fn test_end_to_end_frames() {
        use crate::sample::RawFrame;
        let mut m = mapper();
        let now = Instant::now();

        let update = m.map_at(&RawFrame::new([0, 255, 0, 0], now).normalize(), now);
        assert_eq!(update.params.volume, 0.0);
        assert_eq!(update.params.tempo_bpm, 180);
        assert_eq!(update.params.genre, Genre::ALL[0]);
        assert_eq!(update.params.pattern_index, 0);

        let update = m.map_at(&RawFrame::new([255, 0, 255, 255], now).normalize(), now);
        assert_eq!(update.params.volume, 1.0);
        assert_eq!(update.params.tempo_bpm, 60);
        assert_eq!(update.params.genre, Genre::ALL[Genre::COUNT - 1]);
        assert_eq!(update.params.pattern_index, 3);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn mapped_values_stay_in_range(a in any::<f32>(), b in any::<f32>(), c in any::<f32>(), d in any::<f32>()) {
                let mut m = mapper();
                let (params, _) = m.map(&NormalizedSample::new([a, b, c, d]));
                prop_assert!((0.0..=1.0).contains(&params.volume));
                prop_assert!((60..=180).contains(&params.tempo_bpm));
                prop_assert!(params.pattern_index <= 3);
                prop_assert!(params.genre.index() < Genre::COUNT);
            }

            #[test]
            fn repeated_sample_never_changes(v in proptest::array::uniform4(0.0f32..=1.0)) {
                let mut m = mapper();
                let s = NormalizedSample::new(v);
                let now = Instant::now();
                m.map_at(&s, now);
                prop_assert!(!m.map_at(&s, now).is_changed());
            }
        }
    }
}
