//! Routing of inbound feedback to shared state and the renderer
//!
//! Tempo, genre and volume echoes go to the renderer only; the shared
//! musical parameters belong to the mapper.

use carretto_control::{FeedbackCommand, FeedbackEvent, RenderCommand};
use carretto_core::config::RenderSource;
use carretto_core::{SharedState, SpectrumFrame};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

pub struct FeedbackRouter {
    source: RenderSource,
    state: Arc<SharedState>,
    render_tx: mpsc::Sender<RenderCommand>,
}

impl FeedbackRouter {
    pub fn new(
        source: RenderSource,
        state: Arc<SharedState>,
        render_tx: mpsc::Sender<RenderCommand>,
    ) -> Self {
        Self {
            source,
            state,
            render_tx,
        }
    }

    /// Apply one event. Beat and spectrum only reach the renderer when it
    /// follows the external source.
    pub fn route_at(&self, event: FeedbackEvent, now: Instant) {
        let external = self.source == RenderSource::External;
        match event {
            FeedbackEvent::Beat => {
                if external {
                    self.state.register_beat(now);
                }
            }
            FeedbackEvent::Spectrum(bands) => {
                if external {
                    self.state.set_spectrum(SpectrumFrame::external(bands));
                }
            }
            FeedbackEvent::Tempo(bpm) => self.forward(RenderCommand::Tempo(bpm)),
            FeedbackEvent::Genre(genre) => self.forward(RenderCommand::Genre(genre)),
            FeedbackEvent::Volume(volume) => self.forward(RenderCommand::Volume(volume)),
            FeedbackEvent::Mode(mode) => self.forward(RenderCommand::Mode(mode)),
            FeedbackEvent::Command(FeedbackCommand::Start) => self.forward(RenderCommand::Resume),
            FeedbackEvent::Command(FeedbackCommand::Stop) => self.forward(RenderCommand::Pause),
            FeedbackEvent::Command(FeedbackCommand::Other { name, args }) => {
                info!("Ignoring remote command {} {:?}", name, args);
            }
        }
    }

    fn forward(&self, command: RenderCommand) {
        if self.render_tx.try_send(command).is_err() {
            debug!("Render queue full, feedback dropped");
        }
    }

    pub async fn run(
        self,
        mut events: mpsc::Receiver<FeedbackEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.route_at(event, Instant::now()),
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Feedback router stopped");
    }
}
