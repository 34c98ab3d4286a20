//! Runtime configuration
//!
//! One immutable [`CarrettoConfig`] is built at startup (defaults, then an
//! optional TOML file, then command line overrides) and handed to each
//! component. Every section defaults independently so partial files work.

use crate::logging::LogConfig;
use crate::visual::{ColorOrder, Palette};
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Whether the sensor link may be replaced by simulated input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationPolicy {
    /// Use hardware if it can be opened at startup, otherwise simulate
    #[default]
    Auto,
    /// Always simulate
    Always,
    /// Never simulate; keep retrying the hardware link
    Never,
}

impl FromStr for SimulationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" | "on" | "true" => Ok(Self::Always),
            "never" | "off" | "false" => Ok(Self::Never),
            other => Err(format!("Unknown simulation policy: {}", other)),
        }
    }
}

/// Where the renderer takes its beat and spectrum from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderSource {
    /// Local beat clock and spectrum synthesis
    #[default]
    Local,
    /// Inbound feedback messages from the synthesis engine
    External,
}

/// Pixel output backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedDriverKind {
    /// Art-Net pixel controller
    #[default]
    ArtNet,
    /// In-memory strips (headless)
    Memory,
}

impl FromStr for LedDriverKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "artnet" | "art-net" => Ok(Self::ArtNet),
            "memory" | "none" => Ok(Self::Memory),
            other => Err(format!("Unknown LED driver: {}", other)),
        }
    }
}

/// Sensor link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Serial device; auto-detected when absent
    pub port: Option<String>,
    /// Baud rate of the microcontroller link
    pub baud_rate: u32,
    /// Bounded read timeout
    pub read_timeout_ms: u64,
    /// Fixed-delay reconnect attempts before backing off
    pub max_reconnect_attempts: u32,
    /// Delay between the fixed-delay attempts
    pub retry_delay_ms: u64,
    /// First backoff delay once the attempts are exhausted
    pub backoff_initial_ms: u64,
    /// Backoff cap
    pub backoff_max_ms: u64,
    /// Warn when a previously live link is silent this long
    pub stall_warning_secs: u64,
    /// Simulated input policy
    pub simulate: SimulationPolicy,
    /// Interval of the decoder statistics summary
    pub summary_interval_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
            read_timeout_ms: 10,
            max_reconnect_attempts: 5,
            retry_delay_ms: 2000,
            backoff_initial_ms: 5000,
            backoff_max_ms: 30_000,
            stall_warning_secs: 10,
            simulate: SimulationPolicy::Auto,
            summary_interval_secs: 30,
        }
    }
}

impl SensorConfig {
    /// Read timeout as a [`Duration`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Stall warning window as a [`Duration`]
    pub fn stall_warning(&self) -> Duration {
        Duration::from_secs(self.stall_warning_secs)
    }
}

/// Change gating settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Threshold for volume and tempo
    pub continuous_threshold: f32,
    /// Threshold for genre and pattern
    pub discrete_threshold: f32,
    /// Period after which the full state is forwarded unconditionally
    pub forced_refresh_secs: u64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            continuous_threshold: 0.05,
            discrete_threshold: 0.015,
            forced_refresh_secs: 10,
        }
    }
}

impl MappingConfig {
    /// Forced refresh period as a [`Duration`]
    pub fn forced_refresh(&self) -> Duration {
        Duration::from_secs(self.forced_refresh_secs)
    }
}

/// Beat clock settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// How long `beat_active` stays set after a beat
    pub beat_window_ms: u64,
    /// Telemetry (spectrum) rate
    pub telemetry_hz: u32,
    /// Resolution of the clock task
    pub tick_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            beat_window_ms: 100,
            telemetry_hz: 10,
            tick_ms: 10,
        }
    }
}

impl ClockConfig {
    /// Beat window as a [`Duration`]
    pub fn beat_window(&self) -> Duration {
        Duration::from_millis(self.beat_window_ms)
    }

    /// Telemetry period as a [`Duration`]
    pub fn telemetry_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.telemetry_hz.max(1) as f64)
    }

    /// Tick period as a [`Duration`]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// OSC message channel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    /// Synthesis engine address
    pub target: SocketAddr,
    /// Local address for inbound feedback
    pub listen: SocketAddr,
    /// Liveness heartbeat period
    pub heartbeat_ms: u64,
    /// Listen for feedback messages at all
    pub feedback_enabled: bool,
    /// Where the renderer's beat and spectrum come from
    pub render_source: RenderSource,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            target: SocketAddr::from(([127, 0, 0, 1], 57120)),
            listen: SocketAddr::from(([127, 0, 0, 1], 5005)),
            heartbeat_ms: 1000,
            feedback_enabled: true,
            render_source: RenderSource::Local,
        }
    }
}

impl OscConfig {
    /// Heartbeat period as a [`Duration`]
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

/// LED output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    /// Output backend
    pub driver: LedDriverKind,
    /// Pixels per strip
    pub strip_length: usize,
    /// Global brightness applied by the output adapter
    pub brightness: u8,
    /// Wire color order
    pub color_order: ColorOrder,
    /// Render rate
    pub render_hz: u32,
    /// Art-Net destination
    pub artnet_target: SocketAddr,
    /// First universe of strip A
    pub universe_a: u16,
    /// First universe of strip B
    pub universe_b: u16,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            driver: LedDriverKind::ArtNet,
            strip_length: 512,
            brightness: 50,
            color_order: ColorOrder::Grb,
            render_hz: 50,
            artnet_target: SocketAddr::from(([255, 255, 255, 255], 6454)),
            universe_a: 0,
            universe_b: 4,
        }
    }
}

impl LedConfig {
    /// Render period as a [`Duration`]
    pub fn render_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.render_hz.max(1) as f64)
    }
}

/// Control loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Sensor polling rate
    pub loop_hz: u32,
    /// Interval of the parameter debug snapshot
    pub debug_snapshot_secs: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            loop_hz: 20,
            debug_snapshot_secs: 30,
        }
    }
}

impl ControlConfig {
    /// Loop period as a [`Duration`]
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.loop_hz.max(1) as f64)
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrettoConfig {
    /// Sensor link
    pub sensor: SensorConfig,
    /// Change gating
    pub mapping: MappingConfig,
    /// Beat clock
    pub clock: ClockConfig,
    /// OSC message channel
    pub osc: OscConfig,
    /// LED output
    pub led: LedConfig,
    /// Genre colors and modes
    pub palette: Palette,
    /// Control loop
    pub control: ControlConfig,
    /// Logging
    pub log: LogConfig,
}

impl CarrettoConfig {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        let m = &self.mapping;
        for (name, value) in [
            ("mapping.continuous_threshold", m.continuous_threshold),
            ("mapping.discrete_threshold", m.discrete_threshold),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(invalid(format!("{} must be in (0, 1), got {}", name, value)));
            }
        }
        if m.forced_refresh_secs == 0 {
            return Err(invalid("mapping.forced_refresh_secs must be > 0"));
        }
        if self.sensor.baud_rate == 0 {
            return Err(invalid("sensor.baud_rate must be > 0"));
        }
        if self.sensor.read_timeout_ms == 0 {
            return Err(invalid("sensor.read_timeout_ms must be > 0"));
        }
        if self.sensor.backoff_max_ms < self.sensor.backoff_initial_ms {
            return Err(invalid("sensor.backoff_max_ms must be >= sensor.backoff_initial_ms"));
        }
        if self.clock.beat_window_ms == 0 || self.clock.telemetry_hz == 0 || self.clock.tick_ms == 0
        {
            return Err(invalid("clock rates and windows must be > 0"));
        }
        if self.osc.heartbeat_ms == 0 {
            return Err(invalid("osc.heartbeat_ms must be > 0"));
        }
        if self.led.strip_length == 0 {
            return Err(invalid("led.strip_length must be > 0"));
        }
        if self.led.render_hz == 0 || self.control.loop_hz == 0 {
            return Err(invalid("led.render_hz and control.loop_hz must be > 0"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> CoreError {
    CoreError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::Genre;
    use crate::visual::VisualizationMode;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_validate() {
        let config = CarrettoConfig::default();
        config.validate().unwrap();
        assert_eq!(config.osc.target.port(), 57120);
        assert_eq!(config.osc.listen.port(), 5005);
        assert_eq!(config.led.strip_length, 512);
        assert_eq!(config.led.brightness, 50);
        assert_eq!(config.control.period(), Duration::from_millis(50));
        assert_eq!(config.led.render_period(), Duration::from_millis(20));
        assert_eq!(config.clock.telemetry_period(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_toml() {
        let text = r#"
            [sensor]
            port = "/dev/ttyACM0"
            simulate = "never"

            [led]
            driver = "memory"
            strip_length = 60
            color_order = "RGB"

            [osc]
            render_source = "external"
        "#;
        let config = CarrettoConfig::from_toml(text).unwrap();
        assert_eq!(config.sensor.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.sensor.simulate, SimulationPolicy::Never);
        assert_eq!(config.sensor.baud_rate, 9600);
        assert_eq!(config.led.driver, LedDriverKind::Memory);
        assert_eq!(config.led.strip_length, 60);
        assert_eq!(config.led.color_order, ColorOrder::Rgb);
        assert_eq!(config.osc.render_source, RenderSource::External);
        assert_eq!(config.mapping, MappingConfig::default());
    }

    #[test]
    fn test_palette_override() {
        let text = r#"
            [[palette.styles]]
            genre = "dub"
            color = { r = 10, g = 20, b = 30 }
            mode = "reactive"
        "#;
        let config = CarrettoConfig::from_toml(text).unwrap();
        assert_eq!(config.palette.mode(Genre::Dub), VisualizationMode::Reactive);
        assert_eq!(config.palette.mode(Genre::Techno), VisualizationMode::Flash);
    }

    #[test]
    fn test_load_file_and_missing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("carretto.toml");

        let missing = CarrettoConfig::load(&path).unwrap();
        assert_eq!(missing, CarrettoConfig::default());

        std::fs::write(&path, "[control]\nloop_hz = 40\n").unwrap();
        let loaded = CarrettoConfig::load(&path).unwrap();
        assert_eq!(loaded.control.loop_hz, 40);
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let err = CarrettoConfig::from_toml("[led\nstrip_length = ").unwrap_err();
        assert!(matches!(err, CoreError::ConfigParse(_)));
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = CarrettoConfig::default();
        config.mapping.discrete_threshold = 0.0;
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));

        let mut config = CarrettoConfig::default();
        config.led.strip_length = 0;
        assert!(config.validate().is_err());

        let mut config = CarrettoConfig::default();
        config.sensor.backoff_max_ms = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("ALWAYS".parse::<SimulationPolicy>().unwrap(), SimulationPolicy::Always);
        assert_eq!("artnet".parse::<LedDriverKind>().unwrap(), LedDriverKind::ArtNet);
        assert!("maybe".parse::<SimulationPolicy>().is_err());
    }
}
