//! Potentiometer sensor link
//!
//! The control surface streams 5-byte frames over a serial link. A
//! [`SensorSource`] is selected once at startup: the hardware reader or, when
//! the link cannot be opened and the policy allows it, the simulated source.

pub mod decoder;
pub mod discovery;
pub mod reader;
pub mod simulated;

pub use decoder::{DecoderStats, FrameDecoder, FRAME_LEN, FRAME_MARKER};
pub use discovery::choose_port;
pub use reader::{LinkConnector, ReconnectPolicy, SerialFrameReader};
#[cfg(feature = "serial")]
pub use reader::SerialConnector;
pub use simulated::SimulatedSource;

use carretto_core::config::{SensorConfig, SimulationPolicy};
use carretto_core::RawFrame;
use std::time::Instant;
use tracing::{info, warn};

/// Anything that yields raw sensor frames
pub trait SensorSource: Send {
    /// Latest frame completed since the previous poll, if any
    fn poll_at(&mut self, now: Instant) -> Option<RawFrame>;

    /// [`SensorSource::poll_at`] with the current time
    fn poll(&mut self) -> Option<RawFrame> {
        self.poll_at(Instant::now())
    }

    /// True if frames are not hardware readings
    fn is_simulated(&self) -> bool;

    /// Human readable description for logs
    fn describe(&self) -> String;

    /// Release the underlying connection
    fn close(&mut self) {}
}

/// Select the sensor source according to the simulation policy
pub fn open_sensor(config: &SensorConfig) -> Box<dyn SensorSource> {
    match config.simulate {
        SimulationPolicy::Always => {
            info!("Sensor simulation forced by configuration");
            Box::new(SimulatedSource::new())
        }
        SimulationPolicy::Never => open_hardware(config, false),
        SimulationPolicy::Auto => open_hardware(config, true),
    }
}

#[cfg(feature = "serial")]
fn open_hardware(config: &SensorConfig, fallback: bool) -> Box<dyn SensorSource> {
    let port = config
        .port
        .clone()
        .unwrap_or_else(discovery::detect_port);
    let connector = SerialConnector::new(&port, config.baud_rate, config.read_timeout());
    let mut reader = SerialFrameReader::new(Box::new(connector), config);

    match reader.connect_now(Instant::now()) {
        Ok(()) => Box::new(reader),
        Err(e) if fallback => {
            warn!("Cannot open sensor link on {}: {}", port, e);
            warn!("Falling back to SIMULATED sensor input");
            Box::new(SimulatedSource::new())
        }
        Err(e) => {
            warn!("Cannot open sensor link on {}: {}, will keep retrying", port, e);
            Box::new(reader)
        }
    }
}

#[cfg(not(feature = "serial"))]
fn open_hardware(_config: &SensorConfig, _fallback: bool) -> Box<dyn SensorSource> {
    warn!("Built without serial support, using SIMULATED sensor input");
    Box::new(SimulatedSource::new())
}
