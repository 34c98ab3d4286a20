//! Render task

use super::{next_tick, ticker};
use carretto_control::{ControlError, EffectEngine, RenderCommand};
use carretto_core::config::RenderSource;
use carretto_core::{CarrettoConfig, SharedState};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Log every n-th consecutive output failure
const OUTPUT_ERROR_LOG_EVERY: u64 = 500;

pub async fn run_renderer(
    mut engine: EffectEngine,
    config: Arc<CarrettoConfig>,
    state: Arc<SharedState>,
    mut commands: mpsc::Receiver<RenderCommand>,
    mut shutdown: watch::Receiver<bool>,
) -> EffectEngine {
    let external = config.osc.render_source == RenderSource::External;
    let window = config.clock.beat_window();
    let mut interval = ticker(config.led.render_period());
    info!(
        "Renderer running at {} Hz, mode {}",
        config.led.render_hz,
        engine.mode()
    );

    while next_tick(&mut interval, &mut shutdown).await {
        while let Ok(command) = commands.try_recv() {
            if let Err(e) = engine.apply(command) {
                warn!("Render command failed: {}", e);
            }
        }

        let now = Instant::now();
        // Inbound beats are not expired by the local clock
        if external {
            state.expire_beat(now, window);
        }

        match engine.render_at(now, &state.beat(), &state.spectrum()) {
            Ok(()) | Err(ControlError::EffectError(_)) => {}
            Err(e) => {
                let failures = engine.stats().output_errors;
                if failures == 1 || failures % OUTPUT_ERROR_LOG_EVERY == 0 {
                    warn!(failures, "LED output failed: {}", e);
                }
            }
        }
    }

    if let Err(e) = engine.blank() {
        warn!("Failed to blank LED strips on shutdown: {}", e);
    }
    let stats = engine.stats();
    info!(
        frames = stats.frames,
        skipped = stats.skipped,
        output_errors = stats.output_errors,
        "Renderer stopped"
    );
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use carretto_control::{MemoryStrip, StripSide};
    use carretto_core::{Genre, Palette};
    use std::time::Duration;

    #[tokio::test]
    async fn test_renderer_applies_commands_and_blanks_on_exit() {
        let mut config = CarrettoConfig::default();
        config.led.render_hz = 200;
        let config = Arc::new(config);
        let state = Arc::new(SharedState::new());
        state.register_beat(Instant::now());

        let engine = EffectEngine::new(
            Box::new(MemoryStrip::new(8)),
            Box::new(MemoryStrip::new(8)),
            Palette::default(),
            Instant::now(),
        );
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tx.send(RenderCommand::Genre(Genre::Techno)).await.unwrap();

        let handle = tokio::spawn(run_renderer(engine, config, state, rx, shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        let engine = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(engine.mode(), carretto_core::VisualizationMode::Flash);
        assert!(engine.stats().frames > 0);
        for side in StripSide::BOTH {
            assert!(engine.strip(side).shown().iter().all(|p| p.is_off()));
        }
    }
}
