//! Inbound OSC feedback listener
//!
//! Decodes feedback from the synthesis engine into [`FeedbackEvent`]s and
//! forwards them unchanged; deciding what to do with them is the caller's job.

use super::address::{parse_osc_address, CarrettoAddress};
use super::types::{first_f32, first_string, osc_to_f32, osc_to_string};
use crate::{error::ControlError, Result};
use carretto_core::music::clamp_bpm;
use carretto_core::{Genre, VisualizationMode};
use rosc::{OscMessage, OscPacket};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// Largest datagram accepted
const MAX_PACKET_SIZE: usize = 4096;

/// Generic remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackCommand {
    /// Resume rendering
    Start,
    /// Pause rendering
    Stop,
    /// Anything else, logged only
    Other { name: String, args: Vec<String> },
}

/// Decoded feedback message
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackEvent {
    Beat,
    Tempo(u16),
    Genre(Genre),
    Volume(f32),
    Spectrum(Vec<f32>),
    Mode(VisualizationMode),
    Command(FeedbackCommand),
}

/// Decode one message
pub fn decode_feedback(msg: &OscMessage) -> Result<FeedbackEvent> {
    let address = parse_osc_address(&msg.addr)?;
    let args = &msg.args;

    let event = match address {
        CarrettoAddress::Beat => FeedbackEvent::Beat,
        CarrettoAddress::Bpm => {
            let bpm = first_f32(args)?;
            FeedbackEvent::Tempo(clamp_bpm(bpm.round() as i64))
        }
        CarrettoAddress::Pattern => {
            let name = first_string(args)?;
            let genre = name.parse::<Genre>().map_err(ControlError::InvalidMessage)?;
            FeedbackEvent::Genre(genre)
        }
        CarrettoAddress::Volume => FeedbackEvent::Volume(first_f32(args)?.clamp(0.0, 1.0)),
        CarrettoAddress::Spectrum => {
            let bands = args.iter().map(osc_to_f32).collect::<Result<Vec<f32>>>()?;
            FeedbackEvent::Spectrum(bands)
        }
        CarrettoAddress::Mode => {
            let name = first_string(args)?;
            let mode = name
                .parse::<VisualizationMode>()
                .map_err(ControlError::InvalidMessage)?;
            FeedbackEvent::Mode(mode)
        }
        CarrettoAddress::Command => {
            let name = first_string(args)?;
            let rest = args[1..]
                .iter()
                .map(|a| osc_to_string(a).or_else(|_| osc_to_f32(a).map(|f| f.to_string())))
                .collect::<Result<Vec<String>>>()?;
            let command = match name.as_str() {
                "start" => FeedbackCommand::Start,
                "stop" => FeedbackCommand::Stop,
                _ => FeedbackCommand::Other { name, args: rest },
            };
            FeedbackEvent::Command(command)
        }
        other => {
            return Err(ControlError::InvalidMessage(format!(
                "{} is not a feedback address",
                other.path()
            )))
        }
    };
    Ok(event)
}

/// Decode a packet, flattening bundles; undecodable messages are logged and skipped
pub fn decode_packet(packet: &OscPacket) -> Vec<FeedbackEvent> {
    let mut events = Vec::new();
    collect_events(packet, &mut events);
    events
}

fn collect_events(packet: &OscPacket, events: &mut Vec<FeedbackEvent>) {
    match packet {
        OscPacket::Message(msg) => match decode_feedback(msg) {
            Ok(event) => events.push(event),
            Err(e) => debug!("Ignoring OSC {}: {}", msg.addr, e),
        },
        OscPacket::Bundle(bundle) => {
            for inner in &bundle.content {
                collect_events(inner, events);
            }
        }
    }
}

/// OSC feedback server
pub struct OscServer {
    socket: UdpSocket,
}

impl OscServer {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!("OSC feedback server listening on {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until `shutdown` flips to true, forwarding events to `tx`
    ///
    /// Forwarding never waits: when `tx` is full the event is dropped.
    pub async fn run(
        self,
        tx: mpsc::Sender<FeedbackEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                received = self.socket.recv_from(&mut buf) => {
                    let (n, from) = match received {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("OSC receive error: {}", e);
                            continue;
                        }
                    };
                    let packet = match rosc::decoder::decode_udp(&buf[..n]) {
                        Ok((_, packet)) => packet,
                        Err(e) => {
                            debug!("Malformed OSC packet from {}: {:?}", from, e);
                            continue;
                        }
                    };
                    for event in decode_packet(&packet) {
                        trace!(?event, "OSC feedback from {}", from);
                        if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(event) {
                            debug!("Feedback consumer gone, stopping OSC server");
                            return Ok(());
                        }
                    }
                }
            }
        }
        info!("OSC feedback server stopped");
        Ok(())
    }
}
