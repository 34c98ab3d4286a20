//! Carretto Musicale
//!
//! Reads the potentiometer control surface, drives the synthesis engine over
//! OSC and renders the two LED strips.

mod logging_setup;
mod orchestration;

use anyhow::{Context, Result};
use carretto_core::config::{LedDriverKind, SimulationPolicy};
use carretto_core::CarrettoConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Potentiometer controlled music and light cart", long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults are used when it does not exist
    #[arg(short, long, default_value = "carretto.toml")]
    config: PathBuf,

    /// Serial port of the control surface (auto-detected when omitted)
    #[arg(short, long)]
    port: Option<String>,

    /// Sensor simulation: auto, always or never
    #[arg(long)]
    simulate: Option<SimulationPolicy>,

    /// Synthesis engine OSC address
    #[arg(long)]
    osc_target: Option<SocketAddr>,

    /// Local address for OSC feedback
    #[arg(long)]
    osc_listen: Option<SocketAddr>,

    /// LED output: artnet or memory
    #[arg(long)]
    led_driver: Option<LedDriverKind>,

    /// Pixels per strip
    #[arg(long)]
    strip_length: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Also log to a timestamped file in the log directory
    #[arg(long)]
    log_file: bool,
}

impl Cli {
    /// Command line values take precedence over the file
    fn apply(&self, config: &mut CarrettoConfig) {
        if let Some(port) = &self.port {
            config.sensor.port = Some(port.clone());
        }
        if let Some(simulate) = self.simulate {
            config.sensor.simulate = simulate;
        }
        if let Some(target) = self.osc_target {
            config.osc.target = target;
        }
        if let Some(listen) = self.osc_listen {
            config.osc.listen = listen;
        }
        if let Some(driver) = self.led_driver {
            config.led.driver = driver;
        }
        if let Some(len) = self.strip_length {
            config.led.strip_length = len;
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if self.log_file {
            config.log.file_output = true;
        }
    }
}

/// Where the settings came from, reported once logging is up
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigOrigin {
    File(PathBuf),
    Defaults(PathBuf),
}

fn load_config(cli: &Cli) -> Result<(CarrettoConfig, ConfigOrigin)> {
    let origin = if cli.config.exists() {
        ConfigOrigin::File(cli.config.clone())
    } else {
        ConfigOrigin::Defaults(cli.config.clone())
    };
    let mut config = CarrettoConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {:?}", cli.config))?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok((config, origin))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, origin) = load_config(&cli)?;

    let _log_guard = logging_setup::init(&config.log)?;

    info!("==========================================");
    info!("===   Carretto Musicale Session Start  ===");
    info!("==========================================");
    match &origin {
        ConfigOrigin::File(path) => info!("Configuration loaded from {:?}", path),
        ConfigOrigin::Defaults(path) => {
            info!("No configuration at {:?}, using defaults", path)
        }
    }
    info!(
        osc_target = %config.osc.target,
        osc_listen = %config.osc.listen,
        led_driver = ?config.led.driver,
        render_source = ?config.osc.render_source,
        "Effective settings"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(orchestration::run(config))?;

    info!("Carretto Musicale stopped");
    Ok(())
}
