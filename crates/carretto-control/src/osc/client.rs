//! Outbound OSC client
//!
//! Fire-and-forget over a non-blocking UDP socket. Each address carries one
//! value kind for the whole session; a send with a different kind is dropped,
//! since the synthesis engine dispatches on address and type together.
//! Send failures back off per address, so a failing spectrum send does not
//! silence beats or the heartbeat.

use super::address::CarrettoAddress;
use super::types::{OscValue, ValueKind};
use crate::{error::ControlError, Result};
use carretto_core::{ChangeSet, MusicalParameters, SpectrumFrame};
use parking_lot::Mutex;
use rosc::{OscMessage, OscPacket};
use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

const BACKOFF_INITIAL: Duration = Duration::from_millis(250);
const BACKOFF_MAX: Duration = Duration::from_secs(8);

/// Send failure backoff for one address
#[derive(Debug, Default)]
struct SendBackoff {
    failures: u32,
    until: Option<Instant>,
    dropped: u64,
}

impl SendBackoff {
    fn blocked(&mut self, now: Instant) -> bool {
        match self.until {
            Some(until) if now < until => {
                self.dropped += 1;
                true
            }
            _ => false,
        }
    }

    fn fail(&mut self, now: Instant) -> Duration {
        let exponent = self.failures.min(10);
        let delay = BACKOFF_INITIAL.saturating_mul(1u32 << exponent).min(BACKOFF_MAX);
        self.failures = self.failures.saturating_add(1);
        self.until = Some(now + delay);
        delay
    }

    fn succeed(&mut self) -> Option<u64> {
        if self.failures == 0 {
            return None;
        }
        let dropped = self.dropped;
        *self = Self::default();
        Some(dropped)
    }
}

/// OSC client for the synthesis engine
pub struct OscClient {
    socket: UdpSocket,
    target: SocketAddr,
    started: Instant,
    kinds: Mutex<HashMap<String, ValueKind>>,
    backoff: Mutex<HashMap<String, SendBackoff>>,
}

impl OscClient {
    /// Create a client sending to `target`
    pub fn new(target: SocketAddr) -> Result<Self> {
        let bind: SocketAddr = if target.is_ipv6() {
            SocketAddr::from(([0u16; 8], 0))
        } else {
            SocketAddr::from(([0, 0, 0, 0], 0))
        };
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        if target.ip().is_multicast() || target.ip() == std::net::Ipv4Addr::BROADCAST {
            socket.set_broadcast(true)?;
        }

        let kinds = CarrettoAddress::OUTBOUND
            .iter()
            .filter_map(|a| a.outbound_kind().map(|k| (a.path(), k)))
            .collect();

        info!("OSC client created -> {}", target);

        Ok(Self {
            socket,
            target,
            started: Instant::now(),
            kinds: Mutex::new(kinds),
            backoff: Mutex::new(HashMap::new()),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send `value` on `address`
    ///
    /// The first send on an unknown address registers its kind. Sends during
    /// the address's failure backoff window are dropped and return `Ok`.
    pub fn send(&self, address: &str, value: OscValue) -> Result<()> {
        value.validate()?;
        self.check_kind(address, value.kind())?;

        let now = Instant::now();
        if self
            .backoff
            .lock()
            .get_mut(address)
            .is_some_and(|b| b.blocked(now))
        {
            trace!("OSC send to {} suppressed by backoff", address);
            return Ok(());
        }

        let packet = OscPacket::Message(OscMessage {
            addr: address.to_string(),
            args: value.to_osc_args(),
        });
        let bytes = rosc::encoder::encode(&packet)
            .map_err(|e| ControlError::OscError(format!("{:?}", e)))?;

        match self.socket.send_to(&bytes, self.target) {
            Ok(_) => {
                let recovered = self
                    .backoff
                    .lock()
                    .get_mut(address)
                    .and_then(|b| b.succeed());
                if let Some(dropped) = recovered {
                    info!(dropped, "OSC sends on {} to {} recovered", address, self.target);
                }
                trace!("Sent OSC {} {:?}", address, value);
                Ok(())
            }
            Err(e) => {
                let delay = self
                    .backoff
                    .lock()
                    .entry(address.to_string())
                    .or_default()
                    .fail(now);
                warn!(
                    retry_in_ms = delay.as_millis() as u64,
                    "OSC send on {} to {} failed: {}", address, self.target, e
                );
                Err(ControlError::IoError(e))
            }
        }
    }

    fn check_kind(&self, address: &str, kind: ValueKind) -> Result<()> {
        let mut kinds = self.kinds.lock();
        match kinds.get(address) {
            Some(&expected) if expected != kind => {
                warn!(
                    "Dropping OSC {}: registered as {}, got {}",
                    address, expected, kind
                );
                Err(ControlError::TypeMismatch {
                    address: address.to_string(),
                    expected: expected.name(),
                    actual: kind.name(),
                })
            }
            Some(_) => Ok(()),
            None => {
                kinds.insert(address.to_string(), kind);
                Ok(())
            }
        }
    }

    fn send_to(&self, address: CarrettoAddress, value: OscValue) -> Result<()> {
        self.send(&address.path(), value)
    }

    pub fn send_volume(&self, volume: f32) -> Result<()> {
        self.send_to(CarrettoAddress::Volume, OscValue::Float(volume))
    }

    pub fn send_bpm(&self, bpm: u16) -> Result<()> {
        self.send_to(CarrettoAddress::Bpm, OscValue::Int(bpm as i32))
    }

    /// Genre name on `/carretto/pattern`
    pub fn send_genre(&self, genre: carretto_core::Genre) -> Result<()> {
        self.send_to(CarrettoAddress::Pattern, OscValue::Str(genre.name().to_string()))
    }

    pub fn send_pattern_index(&self, index: u8) -> Result<()> {
        self.send_to(CarrettoAddress::PatternIdx, OscValue::Int(index as i32))
    }

    pub fn send_beat(&self) -> Result<()> {
        self.send_to(CarrettoAddress::Beat, OscValue::Int(1))
    }

    pub fn send_spectrum(&self, frame: &SpectrumFrame) -> Result<()> {
        self.send_to(CarrettoAddress::Spectrum, OscValue::FloatList(frame.bands().to_vec()))
    }

    /// Liveness heartbeat carrying seconds since the client started
    pub fn send_ping(&self) -> Result<()> {
        let uptime = self.started.elapsed().as_secs_f32();
        self.send_to(CarrettoAddress::Ping, OscValue::Float(uptime))
    }

    /// Send the flagged parameters; every flagged send is attempted
    pub fn send_parameters(&self, params: &MusicalParameters, changed: &ChangeSet) -> Result<()> {
        let mut results = Vec::with_capacity(4);
        if changed.volume {
            results.push(self.send_volume(params.volume));
        }
        if changed.tempo {
            results.push(self.send_bpm(params.tempo_bpm));
        }
        if changed.genre {
            results.push(self.send_genre(params.genre));
        }
        if changed.pattern {
            results.push(self.send_pattern_index(params.pattern_index));
        }
        results.into_iter().collect()
    }

    /// Startup probe: one ping, then the full parameter set
    pub fn send_startup(&self, params: &MusicalParameters) -> Result<()> {
        debug!("Sending OSC startup probe");
        self.send_to(CarrettoAddress::Ping, OscValue::Float(1.0))?;
        self.send_parameters(params, &ChangeSet::ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carretto_core::Genre;

    fn receiver() -> (UdpSocket, OscClient) {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let client = OscClient::new(rx.local_addr().unwrap()).unwrap();
        (rx, client)
    }

    fn recv(rx: &UdpSocket) -> OscMessage {
        let mut buf = [0u8; 1024];
        let n = rx.recv(&mut buf).unwrap();
        match rosc::decoder::decode_udp(&buf[..n]).unwrap().1 {
            OscPacket::Message(msg) => msg,
            OscPacket::Bundle(_) => panic!("unexpected bundle"),
        }
    }

    #[test]
    fn test_typed_sends() {
        let (rx, client) = receiver();

        client.send_volume(0.5).unwrap();
        let msg = recv(&rx);
        assert_eq!(msg.addr, "/carretto/volume");
        assert_eq!(msg.args, vec![rosc::OscType::Float(0.5)]);

        client.send_bpm(128).unwrap();
        assert_eq!(recv(&rx).args, vec![rosc::OscType::Int(128)]);

        client.send_genre(Genre::DrumAndBass).unwrap();
        assert_eq!(
            recv(&rx).args,
            vec![rosc::OscType::String("drumandbass".into())]
        );

        client.send_beat().unwrap();
        let msg = recv(&rx);
        assert_eq!(msg.addr, "/carretto/beat");
        assert_eq!(msg.args, vec![rosc::OscType::Int(1)]);

        client.send_spectrum(&SpectrumFrame::silent()).unwrap();
        assert_eq!(recv(&rx).args.len(), carretto_core::SPECTRUM_BANDS);
    }

    #[test]
    fn test_type_drift_is_rejected() {
        let (_rx, client) = receiver();
        let err = client
            .send("/carretto/pattern", OscValue::Int(2))
            .unwrap_err();
        assert!(matches!(err, ControlError::TypeMismatch { .. }));

        // Unknown addresses lock in their first kind
        client.send("/carretto/custom", OscValue::Float(1.0)).unwrap();
        assert!(client.send("/carretto/custom", OscValue::Str("x".into())).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let (_rx, client) = receiver();
        assert!(client.send_volume(f32::NAN).is_err());
    }

    #[test]
    fn test_send_parameters_only_changed() {
        let (rx, client) = receiver();
        let params = MusicalParameters::default();
        let changed = ChangeSet {
            tempo: true,
            ..ChangeSet::NONE
        };
        client.send_parameters(&params, &changed).unwrap();
        let msg = recv(&rx);
        assert_eq!(msg.addr, "/carretto/bpm");
        rx.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
        let mut buf = [0u8; 64];
        assert!(rx.recv(&mut buf).is_err());
    }

    #[test]
    fn test_startup_probe() {
        let (rx, client) = receiver();
        client.send_startup(&MusicalParameters::default()).unwrap();
        let addrs: Vec<String> = (0..5).map(|_| recv(&rx).addr).collect();
        assert_eq!(
            addrs,
            vec![
                "/carretto/ping",
                "/carretto/volume",
                "/carretto/bpm",
                "/carretto/pattern",
                "/carretto/patternIdx"
            ]
        );
    }

    #[test]
    fn test_failed_spectrum_does_not_block_beat() {
        let (rx, client) = receiver();
        // Larger than any UDP datagram
        let oversized = OscValue::FloatList(vec![0.5; 20_000]);
        assert!(client.send("/carretto/spectrum", oversized).is_err());

        // Spectrum is now backing off; the beat still goes out
        client.send_spectrum(&SpectrumFrame::silent()).unwrap();
        client.send_beat().unwrap();
        let msg = recv(&rx);
        assert_eq!(msg.addr, "/carretto/beat");

        client.send_ping().unwrap();
        assert_eq!(recv(&rx).addr, "/carretto/ping");
    }

    #[test]
    fn test_backoff_schedule() {
        let mut backoff = SendBackoff::default();
        let t0 = Instant::now();
        assert_eq!(backoff.fail(t0), Duration::from_millis(250));
        assert!(backoff.blocked(t0 + Duration::from_millis(100)));
        assert!(!backoff.blocked(t0 + Duration::from_millis(250)));
        assert_eq!(backoff.fail(t0), Duration::from_millis(500));
        for _ in 0..10 {
            backoff.fail(t0);
        }
        assert_eq!(backoff.fail(t0), BACKOFF_MAX);
        assert_eq!(backoff.succeed(), Some(1));
        assert_eq!(backoff.succeed(), None);
    }
}
