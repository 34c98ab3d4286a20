//! Hardware sensor reader
//!
//! Non-blocking from the caller's point of view: every poll does at most a
//! bounded-timeout read, and reconnects are scheduled rather than slept on.
//! Reconnect schedule: a fixed number of attempts at a fixed delay, then an
//! exponential backoff up to a cap. The schedule resets on a successful open.

use super::decoder::FrameDecoder;
use super::SensorSource;
use crate::{ControlError, Result};
use carretto_core::config::SensorConfig;
use carretto_core::RawFrame;
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Read chunk size
const READ_CHUNK: usize = 64;
/// Upper bound on reads per poll so a flooding link cannot starve the caller
const MAX_READS_PER_POLL: usize = 16;

/// Opens the byte stream of the sensor link
pub trait LinkConnector: Send {
    /// Open a fresh connection
    fn connect(&mut self) -> Result<Box<dyn Read + Send>>;

    /// Human readable endpoint description
    fn describe(&self) -> String;
}

/// Serial port connector
#[cfg(feature = "serial")]
pub struct SerialConnector {
    port: String,
    baud_rate: u32,
    timeout: Duration,
}

#[cfg(feature = "serial")]
impl SerialConnector {
    pub fn new(port: &str, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            timeout,
        }
    }
}

#[cfg(feature = "serial")]
impl LinkConnector for SerialConnector {
    fn connect(&mut self) -> Result<Box<dyn Read + Send>> {
        let port = serialport::new(&self.port, self.baud_rate)
            .timeout(self.timeout)
            .open()?;
        // Stale bytes from before the open only desynchronise the decoder
        if let Err(e) = port.clear(serialport::ClearBuffer::Input) {
            debug!("Could not clear serial input buffer: {}", e);
        }
        Ok(Box::new(port))
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.port, self.baud_rate)
    }
}

/// Reconnect schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts made at `retry_delay` before backing off
    pub max_attempts: u32,
    /// Delay between the first attempts
    pub retry_delay: Duration,
    /// First backoff delay
    pub backoff_initial: Duration,
    /// Backoff cap
    pub backoff_max: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &SensorConfig) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            backoff_initial: Duration::from_millis(config.backoff_initial_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay before the next attempt after `failures` consecutive failures
    pub fn delay_after(&self, failures: u32) -> Duration {
        if failures < self.max_attempts {
            return self.retry_delay;
        }
        let exponent = (failures - self.max_attempts).min(16);
        self.backoff_initial
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }
}

/// Sensor reader over a reconnecting byte link
pub struct SerialFrameReader {
    connector: Box<dyn LinkConnector>,
    link: Option<Box<dyn Read + Send>>,
    decoder: FrameDecoder,
    policy: ReconnectPolicy,
    failures: u32,
    next_attempt: Option<Instant>,
    last_data: Option<Instant>,
    stall_warning: Duration,
    stall_warned: bool,
    summary_interval: Duration,
    last_summary: Option<Instant>,
}

impl SerialFrameReader {
    /// Create a disconnected reader; the first poll attempts to connect
    pub fn new(connector: Box<dyn LinkConnector>, config: &SensorConfig) -> Self {
        Self {
            connector,
            link: None,
            decoder: FrameDecoder::new(),
            policy: ReconnectPolicy::from_config(config),
            failures: 0,
            next_attempt: None,
            last_data: None,
            stall_warning: config.stall_warning(),
            stall_warned: false,
            summary_interval: Duration::from_secs(config.summary_interval_secs.max(1)),
            last_summary: None,
        }
    }

    /// Try to open the link immediately
    pub fn connect_now(&mut self, now: Instant) -> Result<()> {
        match self.connector.connect() {
            Ok(link) => {
                info!("Sensor link open: {}", self.connector.describe());
                self.link = Some(link);
                self.decoder.reset();
                self.failures = 0;
                self.next_attempt = None;
                Ok(())
            }
            Err(e) => {
                self.failures = self.failures.saturating_add(1);
                let delay = self.policy.delay_after(self.failures);
                self.next_attempt = Some(now + delay);
                warn!(
                    attempt = self.failures,
                    retry_in_ms = delay.as_millis() as u64,
                    "Sensor link {} unavailable: {}",
                    self.connector.describe(),
                    e
                );
                Err(e)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Consecutive failed open attempts
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// When the next reconnect attempt is due, if disconnected
    pub fn next_attempt(&self) -> Option<Instant> {
        self.next_attempt
    }

    fn disconnect(&mut self, now: Instant, reason: &ControlError) {
        warn!("Sensor link lost ({}), reconnecting", reason);
        self.link = None;
        self.decoder.reset();
        self.next_attempt = Some(now);
    }

    fn read_frames(&mut self, now: Instant) -> Option<[u8; 4]> {
        let link = self.link.as_mut()?;
        let mut latest = None;
        let mut chunk = [0u8; READ_CHUNK];
        let mut failure = None;

        for _ in 0..MAX_READS_PER_POLL {
            match link.read(&mut chunk) {
                Ok(0) => {
                    failure = Some(ControlError::SerialError("end of stream".into()));
                    break;
                }
                Ok(n) => {
                    if let Some(frame) = self.decoder.decode(&chunk[..n]).pop() {
                        latest = Some(frame);
                    }
                    if n < chunk.len() {
                        break;
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    // Quiet link: release a frame held for lookahead
                    if let Some(frame) = self.decoder.flush() {
                        latest = Some(frame);
                    }
                    break;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => break,
                Err(e) => {
                    failure = Some(ControlError::IoError(e));
                    break;
                }
            }
        }

        if let Some(reason) = failure {
            self.disconnect(now, &reason);
        }
        latest
    }

    fn check_stall(&mut self, now: Instant) {
        let Some(last) = self.last_data else {
            return;
        };
        if !self.stall_warned && now.saturating_duration_since(last) >= self.stall_warning {
            warn!(
                "No sensor data for {}s",
                now.saturating_duration_since(last).as_secs()
            );
            self.stall_warned = true;
        }
    }

    fn log_summary(&mut self, now: Instant) {
        let due = match self.last_summary {
            None => {
                self.last_summary = Some(now);
                false
            }
            Some(t) => now.saturating_duration_since(t) >= self.summary_interval,
        };
        if !due {
            return;
        }
        self.last_summary = Some(now);
        let stats = self.decoder.take_stats();
        if stats.has_desync() {
            info!(
                frames = stats.frames,
                skipped_bytes = stats.skipped_bytes,
                discarded_frames = stats.discarded_frames,
                "Sensor link resynchronised"
            );
        } else {
            debug!(frames = stats.frames, "Sensor link summary");
        }
    }
}

impl SensorSource for SerialFrameReader {
    fn poll_at(&mut self, now: Instant) -> Option<RawFrame> {
        if self.link.is_none() {
            let due = self.next_attempt.map_or(true, |t| now >= t);
            if !due || self.connect_now(now).is_err() {
                return None;
            }
        }

        let frame = self.read_frames(now);
        if frame.is_some() {
            if self.stall_warned {
                info!("Sensor data resumed");
            }
            self.last_data = Some(now);
            self.stall_warned = false;
        } else {
            self.check_stall(now);
        }
        self.log_summary(now);

        frame.map(|data| RawFrame::new(data, now))
    }

    fn is_simulated(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("serial {}", self.connector.describe())
    }

    fn close(&mut self) {
        if self.link.take().is_some() {
            info!("Sensor link closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Arc;

    /// Reader that replays scripted read results
    struct ScriptedLink {
        reads: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Read for ScriptedLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(ErrorKind::TimedOut, "timeout")),
            }
        }
    }

    /// Connector that hands out scripted links, or fails when the script is empty
    #[derive(Clone, Default)]
    struct ScriptedConnector {
        links: Arc<Mutex<VecDeque<ScriptedLink>>>,
        connects: Arc<Mutex<u32>>,
    }

    impl ScriptedConnector {
        fn push(&self, reads: Vec<io::Result<Vec<u8>>>) {
            self.links.lock().push_back(ScriptedLink {
                reads: reads.into(),
            });
        }
    }

    impl LinkConnector for ScriptedConnector {
        fn connect(&mut self) -> Result<Box<dyn Read + Send>> {
            *self.connects.lock() += 1;
            match self.links.lock().pop_front() {
                Some(link) => Ok(Box::new(link)),
                None => Err(ControlError::SerialError("no device".into())),
            }
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    fn reader(connector: &ScriptedConnector) -> SerialFrameReader {
        SerialFrameReader::new(Box::new(connector.clone()), &SensorConfig::default())
    }

    #[test]
    fn test_policy_schedule() {
        let policy = ReconnectPolicy::from_config(&SensorConfig::default());
        for failures in 1..5 {
            assert_eq!(policy.delay_after(failures), Duration::from_secs(2));
        }
        assert_eq!(policy.delay_after(5), Duration::from_secs(5));
        assert_eq!(policy.delay_after(6), Duration::from_secs(10));
        assert_eq!(policy.delay_after(7), Duration::from_secs(20));
        assert_eq!(policy.delay_after(8), Duration::from_secs(30));
        assert_eq!(policy.delay_after(50), Duration::from_secs(30));
    }

    #[test]
    fn test_reads_latest_frame() {
        let connector = ScriptedConnector::default();
        connector.push(vec![Ok(vec![0xFF, 1, 2, 3, 4, 0xFF, 5, 6, 7, 8])]);
        let mut r = reader(&connector);

        let frame = r.poll_at(Instant::now()).unwrap();
        assert_eq!(frame.channels, [5, 6, 7, 8]);
        assert!(!frame.simulated);
        assert!(r.poll_at(Instant::now()).is_none());
    }

    #[test]
    fn test_frame_split_across_reads() {
        let connector = ScriptedConnector::default();
        connector.push(vec![
            Ok(vec![0xFF, 1]),
            Err(io::Error::new(ErrorKind::TimedOut, "timeout")),
            Ok(vec![2, 3, 4]),
        ]);
        let mut r = reader(&connector);
        let t0 = Instant::now();
        assert!(r.poll_at(t0).is_none());
        assert!(r.poll_at(t0).is_none());
        assert_eq!(r.poll_at(t0).unwrap().channels, [1, 2, 3, 4]);
    }

    #[test]
    fn test_full_scale_frame_released_when_link_goes_quiet() {
        let connector = ScriptedConnector::default();
        connector.push(vec![Ok(vec![0xFF, 0, 255, 0, 0])]);
        let mut r = reader(&connector);
        let t0 = Instant::now();

        assert!(r.poll_at(t0).is_none());
        assert_eq!(r.poll_at(t0).unwrap().channels, [0, 255, 0, 0]);
        assert!(r.poll_at(t0).is_none());
    }

    #[test]
    fn test_reconnect_after_io_error() {
        let connector = ScriptedConnector::default();
        connector.push(vec![
            Ok(vec![0xFF, 1, 2]),
            Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged")),
        ]);
        connector.push(vec![Ok(vec![3, 4, 0xFF, 9, 9, 9, 9])]);
        let mut r = reader(&connector);
        let t0 = Instant::now();

        assert!(r.poll_at(t0).is_none());
        assert!(r.is_connected());
        assert!(r.poll_at(t0).is_none());
        assert!(!r.is_connected());

        // Partial frame from the dead link must not leak into the new one
        let frame = r.poll_at(t0).unwrap();
        assert_eq!(frame.channels, [9, 9, 9, 9]);
        assert_eq!(*connector.connects.lock(), 2);
    }

    #[test]
    fn test_failed_opens_follow_schedule() {
        let connector = ScriptedConnector::default();
        let mut r = reader(&connector);
        let t0 = Instant::now();

        assert!(r.poll_at(t0).is_none());
        assert_eq!(r.failures(), 1);
        assert_eq!(r.next_attempt(), Some(t0 + Duration::from_secs(2)));

        // Not due yet: no attempt
        assert!(r.poll_at(t0 + Duration::from_secs(1)).is_none());
        assert_eq!(*connector.connects.lock(), 1);

        let mut now = t0;
        for _ in 0..4 {
            now = r.next_attempt().unwrap();
            r.poll_at(now);
        }
        assert_eq!(r.failures(), 5);
        assert_eq!(r.next_attempt(), Some(now + Duration::from_secs(5)));

        connector.push(vec![Ok(vec![0xFF, 1, 1, 1, 1])]);
        let now = r.next_attempt().unwrap();
        assert!(r.poll_at(now).is_some());
        assert_eq!(r.failures(), 0);
    }

    #[test]
    fn test_end_of_stream_is_disconnect() {
        let connector = ScriptedConnector::default();
        connector.push(vec![Ok(vec![])]);
        let mut r = reader(&connector);
        r.poll_at(Instant::now());
        assert!(!r.is_connected());
    }

    #[test]
    fn test_close_releases_link() {
        let connector = ScriptedConnector::default();
        connector.push(vec![]);
        let mut r = reader(&connector);
        r.poll_at(Instant::now());
        assert!(r.is_connected());
        r.close();
        assert!(!r.is_connected());
    }
}
