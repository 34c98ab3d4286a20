//! Wiring of the four concurrent activities
//!
//! - control loop (dedicated thread): sensor polling, mapping, parameter sends
//! - beat clock and heartbeat tasks
//! - OSC feedback listener and router
//! - render task
//!
//! They share [`SharedState`] and talk to the renderer through a bounded
//! channel of [`RenderCommand`]s. A `watch` flag set on Ctrl-C stops them all.

pub mod clock;
pub mod control;
pub mod feedback;
pub mod render;

use anyhow::{Context, Result};
use carretto_control::osc::OscServer;
use carretto_control::{open_sensor, open_strips, EffectEngine, OscClient, RenderCommand};
use carretto_core::{CarrettoConfig, SharedState};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info, warn};

use self::control::ControlLoop;
use self::feedback::FeedbackRouter;

/// Pending renderer inputs before new ones are dropped
const RENDER_QUEUE: usize = 64;
/// Pending feedback events before new ones are dropped
const FEEDBACK_QUEUE: usize = 256;

/// Fixed-rate ticker that skips rather than bursts after a stall
pub(crate) fn ticker(period: std::time::Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Wait for the next tick; false once shutdown was requested
pub(crate) async fn next_tick(interval: &mut Interval, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = interval.tick() => !*shutdown.borrow(),
        changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
    }
}

/// Run until Ctrl-C
pub async fn run(config: CarrettoConfig) -> Result<()> {
    let config = Arc::new(config);
    let state = Arc::new(SharedState::new());
    let osc = Arc::new(
        OscClient::new(config.osc.target).context("Failed to create OSC client socket")?,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (render_tx, render_rx) = mpsc::channel::<RenderCommand>(RENDER_QUEUE);

    info!(
        "OSC target {}, render source {:?}",
        config.osc.target, config.osc.render_source
    );
    if let Err(e) = osc.send_startup(&state.params()) {
        warn!("OSC startup probe failed: {}", e);
    }

    // Render
    let strips = open_strips(&config.led);
    if strips.degraded {
        warn!("LED hardware unavailable, rendering to memory only");
    }
    let engine = EffectEngine::new(strips.a, strips.b, config.palette.clone(), Instant::now())
        .with_beat_window(config.clock.beat_window());
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    let render_task = render::run_renderer(
        engine,
        config.clone(),
        state.clone(),
        render_rx,
        shutdown_rx.clone(),
    );
    tasks.push(tokio::spawn(async move {
        render_task.await;
    }));

    // Beat clock and heartbeat
    tasks.push(tokio::spawn(clock::run_beat_clock(
        config.clone(),
        state.clone(),
        osc.clone(),
        shutdown_rx.clone(),
    )));
    tasks.push(tokio::spawn(clock::run_heartbeat(
        config.osc.heartbeat(),
        osc.clone(),
        shutdown_rx.clone(),
    )));

    // Feedback
    if config.osc.feedback_enabled {
        match OscServer::bind(config.osc.listen).await {
            Ok(server) => {
                let (feedback_tx, feedback_rx) = mpsc::channel(FEEDBACK_QUEUE);
                let server_shutdown = shutdown_rx.clone();
                tasks.push(tokio::spawn(async move {
                    if let Err(e) = server.run(feedback_tx, server_shutdown).await {
                        error!("OSC feedback server failed: {}", e);
                    }
                }));
                let router = FeedbackRouter::new(
                    config.osc.render_source,
                    state.clone(),
                    render_tx.clone(),
                );
                tasks.push(tokio::spawn(router.run(feedback_rx, shutdown_rx.clone())));
            }
            Err(e) => warn!(
                "OSC feedback disabled, cannot listen on {}: {}",
                config.osc.listen, e
            ),
        }
    }

    // Control loop on its own thread; sensor reads block for up to the read timeout
    let sensor = tokio::task::spawn_blocking({
        let sensor_config = config.sensor.clone();
        move || open_sensor(&sensor_config)
    })
    .await
    .context("Sensor setup panicked")?;
    info!("Sensor source: {}", sensor.describe());

    let control = ControlLoop::new(&config, sensor, state.clone(), osc.clone(), render_tx);
    let control_shutdown = shutdown_rx.clone();
    let control_thread = std::thread::Builder::new()
        .name("carretto-control".to_string())
        .spawn(move || control.run(control_shutdown))
        .context("Failed to spawn control thread")?;

    info!("Carretto running, press Ctrl-C to stop");
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Cannot listen for Ctrl-C ({}), shutting down", e),
    }
    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            error!("Task ended abnormally: {}", e);
        }
    }
    match tokio::task::spawn_blocking(move || control_thread.join()).await {
        Ok(Ok(())) => {}
        _ => error!("Control thread ended abnormally"),
    }

    Ok(())
}
