//! Sensor sample types
//!
//! A [`RawFrame`] is what the sensor link delivers: four 8-bit potentiometer
//! readings. A [`NormalizedSample`] is the same reading scaled to `0.0..=1.0`,
//! which is what the parameter mapper consumes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::warn;

/// Number of potentiometer channels on the control surface
pub const CHANNEL_COUNT: usize = 4;

/// One potentiometer on the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Volume knob
    Pot1,
    /// Tempo knob
    Pot2,
    /// Genre knob
    Pot3,
    /// Pattern knob
    Pot4,
}

impl Channel {
    /// All channels in wire order
    pub const ALL: [Channel; CHANNEL_COUNT] =
        [Channel::Pot1, Channel::Pot2, Channel::Pot3, Channel::Pot4];

    /// Position of this channel inside a frame
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable identifier (`pot1`..`pot4`)
    pub fn id(self) -> &'static str {
        match self {
            Channel::Pot1 => "pot1",
            Channel::Pot2 => "pot2",
            Channel::Pot3 => "pot3",
            Channel::Pot4 => "pot4",
        }
    }

    /// Whether this channel selects a discrete value (genre, pattern)
    pub fn is_discrete(self) -> bool {
        matches!(self, Channel::Pot3 | Channel::Pot4)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.id() == s)
            .ok_or_else(|| format!("Unknown channel: {}", s))
    }
}

/// Four raw channel bytes as decoded from the sensor link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    /// Raw 8-bit samples, index = channel
    pub channels: [u8; CHANNEL_COUNT],
    /// Arrival time of the last byte of the frame
    pub received_at: Instant,
    /// True when the frame came from the simulated source, never from hardware
    pub simulated: bool,
}

impl RawFrame {
    /// Create a frame read from hardware
    pub fn new(channels: [u8; CHANNEL_COUNT], received_at: Instant) -> Self {
        Self {
            channels,
            received_at,
            simulated: false,
        }
    }

    /// Create a frame produced by the simulated source
    pub fn simulated(channels: [u8; CHANNEL_COUNT], received_at: Instant) -> Self {
        Self {
            channels,
            received_at,
            simulated: true,
        }
    }

    /// Raw value of one channel
    pub fn get(&self, channel: Channel) -> u8 {
        self.channels[channel.index()]
    }

    /// Scale the frame to `0.0..=1.0`
    pub fn normalize(&self) -> NormalizedSample {
        NormalizedSample::from_raw(self)
    }
}

/// Channel values scaled to `0.0..=1.0`
///
/// Every channel is always present; construction clamps out-of-range values so
/// the invariant holds even for malformed input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedSample {
    values: [f32; CHANNEL_COUNT],
    /// Propagated from [`RawFrame::simulated`]
    pub simulated: bool,
}

impl NormalizedSample {
    /// Build a sample from arbitrary floats, clamping anything outside `[0, 1]`.
    ///
    /// NaN becomes `0.0`, infinities clamp to the nearest bound. Every
    /// correction is logged.
    pub fn new(values: [f32; CHANNEL_COUNT]) -> Self {
        let mut clean = [0.0; CHANNEL_COUNT];
        for channel in Channel::ALL {
            clean[channel.index()] = sanitize(channel, values[channel.index()]);
        }
        Self {
            values: clean,
            simulated: false,
        }
    }

    /// Scale a raw frame
    pub fn from_raw(frame: &RawFrame) -> Self {
        let mut values = [0.0; CHANNEL_COUNT];
        for (value, raw) in values.iter_mut().zip(frame.channels) {
            *value = raw as f32 / 255.0;
        }
        Self {
            values,
            simulated: frame.simulated,
        }
    }

    /// Value of one channel
    pub fn get(&self, channel: Channel) -> f32 {
        self.values[channel.index()]
    }

    /// All channel values in wire order
    pub fn values(&self) -> [f32; CHANNEL_COUNT] {
        self.values
    }
}

fn sanitize(channel: Channel, value: f32) -> f32 {
    if value.is_nan() {
        warn!(%channel, "Non-numeric channel value, using 0.0");
        return 0.0;
    }
    if !(0.0..=1.0).contains(&value) {
        let clamped = value.clamp(0.0, 1.0);
        warn!(%channel, value, clamped, "Channel value out of range, clamped");
        return clamped;
    }
    value
}
