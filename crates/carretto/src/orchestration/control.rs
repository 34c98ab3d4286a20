//! Control loop: sensor → mapper → OSC and renderer
//!
//! Runs on a dedicated thread because serial reads block for up to the read
//! timeout.

use carretto_control::{OscClient, RenderCommand, SensorSource};
use carretto_core::{CarrettoConfig, ParameterMapper, ParameterUpdate, SharedState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

pub struct ControlLoop {
    sensor: Box<dyn SensorSource>,
    mapper: ParameterMapper,
    state: Arc<SharedState>,
    osc: Arc<OscClient>,
    render_tx: mpsc::Sender<RenderCommand>,
    period: Duration,
    snapshot_every: Duration,
    last_snapshot: Option<Instant>,
}

impl ControlLoop {
    pub fn new(
        config: &CarrettoConfig,
        sensor: Box<dyn SensorSource>,
        state: Arc<SharedState>,
        osc: Arc<OscClient>,
        render_tx: mpsc::Sender<RenderCommand>,
    ) -> Self {
        Self {
            sensor,
            mapper: ParameterMapper::new(&config.mapping),
            state,
            osc,
            render_tx,
            period: config.control.period(),
            snapshot_every: Duration::from_secs(config.control.debug_snapshot_secs),
            last_snapshot: None,
        }
    }

    /// One iteration: poll the sensor, map, forward if anything changed
    pub fn tick_at(&mut self, now: Instant) -> Option<ParameterUpdate> {
        let update = match self.sensor.poll_at(now) {
            Some(frame) => {
                let sample = frame.normalize();
                Some(self.mapper.map_at(&sample, now))
            }
            None => self.mapper.poll_refresh(now),
        };

        let update = update.filter(|u| u.is_changed())?;
        self.publish(&update);
        Some(update)
    }

    fn publish(&self, update: &ParameterUpdate) {
        let params = update.params;
        if !update.forced {
            info!(
                "Parameters: volume {:.2}, {} BPM, {} ({}), pattern {}",
                params.volume,
                params.tempo_bpm,
                params.genre,
                params.pattern_name(),
                params.pattern_index
            );
        }

        self.state.set_params(params);

        if let Err(e) = self.osc.send_parameters(&params, &update.changed) {
            debug!("Parameter send failed: {}", e);
        }
        if self.render_tx.try_send(RenderCommand::Parameters(params)).is_err() {
            debug!("Render queue full, parameter update dropped");
        }
    }

    fn snapshot_at(&mut self, now: Instant) {
        let due = self
            .last_snapshot
            .map_or(true, |last| now.saturating_duration_since(last) >= self.snapshot_every);
        if due {
            self.last_snapshot = Some(now);
            debug!(
                params = ?self.state.params(),
                beat = ?self.state.beat(),
                sensor = %self.sensor.describe(),
                "Control snapshot"
            );
        }
    }

    /// Loop until shutdown, then release the sensor
    pub fn run(mut self, shutdown: watch::Receiver<bool>) {
        info!("Control loop running every {:?}", self.period);
        while !*shutdown.borrow() {
            let started = Instant::now();
            self.tick_at(started);
            self.snapshot_at(started);

            if let Some(rest) = self.period.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        self.sensor.close();
        info!("Control loop stopped, sensor released");
    }
}
