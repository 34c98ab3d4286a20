//! Carretto Control - Device and Network Integration
//!
//! Everything in the pipeline that talks to the outside world:
//! - **Sensor**: framed potentiometer bytes over a serial link, with
//!   resynchronisation, reconnect backoff and a simulated fallback
//! - **OSC**: typed outbound messages to the synthesis engine and the
//!   inbound feedback listener
//! - **LED**: the pixel strip abstraction and an Art-Net output
//! - **Effects**: the eight visualization modes and the two-strip render engine
//!
//! ## Feature Flags
//!
//! - `serial`: Enable the hardware sensor link (requires `serialport`)
//!
//! ## Modules
//!
//! - [`sensor`] - Frame decoding and sensor sources
//! - [`osc`] - OSC client and server
//! - [`led`] - Pixel strips
//! - [`effects`] - Visualization modes
//! - [`engine`] - Render engine
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Error types
pub mod error;

/// Sensor link and frame decoding
pub mod sensor;

/// OSC server and client
pub mod osc;

/// Pixel strip output
pub mod led;

/// Visualization modes
pub mod effects;

/// Two-strip render engine
pub mod engine;

// Re-exports
pub use error::{ControlError, Result};

pub use effects::{effect_for, FrameContext, StripEffect};
pub use engine::{EffectEngine, EngineStats, RenderCommand};
pub use led::{open_strips, ArtNetStrip, MemoryStrip, PixelStrip, StripSide};
pub use osc::{FeedbackCommand, FeedbackEvent, OscClient, OscServer, OscValue};
pub use sensor::{open_sensor, FrameDecoder, SensorSource, SerialFrameReader, SimulatedSource};
