//! Beat, telemetry and heartbeat timing

use super::{next_tick, ticker};
use carretto_control::OscClient;
use carretto_core::config::RenderSource;
use carretto_core::{BeatClock, CarrettoConfig, ClockEvent, SharedState, SpectrumSynth};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// What one clock tick produced for the outside world
#[derive(Debug, Default, PartialEq)]
pub struct TickOutput {
    pub beats: u32,
    pub telemetry: bool,
}

/// Beat clock driven at `clock.tick_ms`
///
/// Beats and synthesised spectra always go out over OSC. With a local render
/// source they are also published to the shared state for the renderer.
pub struct ClockDriver {
    clock: BeatClock,
    synth: SpectrumSynth,
    state: Arc<SharedState>,
    osc: Arc<OscClient>,
    publish: bool,
}

impl ClockDriver {
    pub fn new(config: &CarrettoConfig, state: Arc<SharedState>, osc: Arc<OscClient>) -> Self {
        Self {
            clock: BeatClock::new(&config.clock, state.params().tempo_bpm),
            synth: SpectrumSynth::new(),
            state,
            osc,
            publish: config.osc.render_source == RenderSource::Local,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.clock.start(now);
    }

    pub fn stop(&mut self) {
        self.clock.stop();
    }

    pub fn tick_at(&mut self, now: Instant) -> TickOutput {
        let params = self.state.params();
        self.clock.follow(&params);

        let mut output = TickOutput::default();
        for event in self.clock.advance(now) {
            match event {
                ClockEvent::Beat { counter } => {
                    trace!(counter, "Beat");
                    output.beats += 1;
                    if let Err(e) = self.osc.send_beat() {
                        debug!("Beat send failed: {}", e);
                    }
                }
                ClockEvent::BeatEnd => {}
                ClockEvent::Telemetry => {
                    output.telemetry = true;
                    let frame = self.synth.generate(params.genre, params.volume);
                    if let Err(e) = self.osc.send_spectrum(&frame) {
                        debug!("Spectrum send failed: {}", e);
                    }
                    if self.publish {
                        self.state.set_spectrum(frame);
                    }
                }
            }
        }

        if self.publish {
            self.state.set_beat(self.clock.beat_state());
        }
        output
    }
}

pub async fn run_beat_clock(
    config: Arc<CarrettoConfig>,
    state: Arc<SharedState>,
    osc: Arc<OscClient>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut driver = ClockDriver::new(&config, state, osc);
    let mut interval = ticker(config.clock.tick());
    driver.start(Instant::now());

    let mut beats = 0u64;
    let mut telemetry = 0u64;
    while next_tick(&mut interval, &mut shutdown).await {
        let out = driver.tick_at(Instant::now());
        beats += out.beats as u64;
        telemetry += out.telemetry as u64;
    }

    driver.stop();
    info!(beats, telemetry, "Beat clock task stopped");
}

/// Liveness ping at a fixed period
pub async fn run_heartbeat(
    period: Duration,
    osc: Arc<OscClient>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = ticker(period);
    while next_tick(&mut interval, &mut shutdown).await {
        if let Err(e) = osc.send_ping() {
            debug!("Heartbeat send failed: {}", e);
        }
    }
    debug!("Heartbeat task stopped");
}
