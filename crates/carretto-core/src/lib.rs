//! Carretto Core - Domain Model and Control Logic
//!
//! This crate contains everything in the control pipeline that does not touch
//! a device or a socket:
//! - Sensor sample types (raw frames, normalized samples)
//! - Musical parameters, genres and visualization modes
//! - Parameter mapping with per-channel change gating
//! - The beat clock and shared beat state
//! - Spectrum synthesis and smoothing
//! - Configuration and logging configuration

#![warn(missing_docs)]

use thiserror::Error;

pub mod clock;
pub mod config;
pub mod logging;
pub mod mapping;
pub mod music;
pub mod sample;
pub mod spectrum;
pub mod state;
pub mod visual;

// --- Re-exports grouped by category ---

// Sensor samples
pub use sample::{Channel, NormalizedSample, RawFrame, CHANNEL_COUNT};

// Music model
pub use music::{Genre, MusicalParameters, PATTERN_NAMES};

// Mapping & timing
pub use clock::{BeatClock, BeatState, ClockEvent, ClockState};
pub use mapping::{ChangeSet, ParameterMapper, ParameterUpdate};

// Spectrum
pub use spectrum::{SpectrumFrame, SpectrumSource, SpectrumSynth, SMOOTHING_ALPHA, SPECTRUM_BANDS};

// Visual model
pub use visual::{ColorOrder, GenreStyle, Palette, Rgb, VisualizationMode};

// Configuration & State
pub use config::{
    CarrettoConfig, ClockConfig, ControlConfig, LedConfig, LedDriverKind, MappingConfig,
    OscConfig, RenderSource, SensorConfig, SimulationPolicy,
};
pub use logging::LogConfig;
pub use state::SharedState;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration value out of its valid domain
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
