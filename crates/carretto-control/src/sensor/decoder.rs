//! Sensor frame decoder
//!
//! Wire format: `[0xFF][b0][b1][b2][b3]`, no checksum. The marker value can
//! also occur as a data byte (a knob turned fully open), so a marker inside a
//! frame only *tentatively* restarts buffering:
//!
//! - A 5-byte candidate whose data holds no marker is emitted at once.
//! - A candidate whose data holds a marker is kept for one byte of lookahead.
//!   If that byte is a marker the candidate was a real frame and is emitted.
//!   Otherwise it is dropped and decoding resumes from the first marker inside
//!   it, which is exactly where the restart rule would have resynchronised.
//!
//! A held candidate only resolves when the next byte arrives. When the link
//! goes quiet instead, the reader calls [`FrameDecoder::flush`] to release it.

use tracing::trace;

/// Frame start byte
pub const FRAME_MARKER: u8 = 0xFF;
/// Marker plus four data bytes
pub const FRAME_LEN: usize = 5;

/// Counters for the periodic desync summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames emitted
    pub frames: u64,
    /// Bytes seen outside any frame
    pub skipped_bytes: u64,
    /// Candidates dropped on resynchronisation
    pub discarded_frames: u64,
}

impl DecoderStats {
    /// True if any desynchronisation was observed
    pub fn has_desync(&self) -> bool {
        self.skipped_bytes > 0 || self.discarded_frames > 0
    }
}

/// Byte-at-a-time frame decoder with marker resynchronisation
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    held: Option<[u8; FRAME_LEN]>,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(FRAME_LEN),
            held: None,
            stats: DecoderStats::default(),
        }
    }

    /// Feed one byte, returning a frame's data bytes when one completes
    ///
    /// A frame whose data contains the marker completes one byte late, or on
    /// [`FrameDecoder::flush`].
    pub fn push(&mut self, byte: u8) -> Option<[u8; 4]> {
        let mut out = Vec::new();
        self.step(byte, &mut out);
        // A single byte completes at most one frame
        out.pop()
    }

    /// Feed a chunk, returning every frame completed by it in order
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<[u8; 4]> {
        let mut out = Vec::new();
        for &byte in bytes {
            self.step(byte, &mut out);
        }
        out
    }

    /// Emit a candidate still waiting for lookahead
    ///
    /// For a quiet link: a sender that paused has finished its last frame.
    /// A partially buffered frame is kept.
    pub fn flush(&mut self) -> Option<[u8; 4]> {
        let candidate = self.held.take()?;
        let mut out = Vec::with_capacity(1);
        self.emit(&candidate, &mut out);
        out.pop()
    }

    /// Drop any partial state, e.g. after the link was reopened
    pub fn reset(&mut self) {
        self.buf.clear();
        self.held = None;
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Take the counters, zeroing them
    pub fn take_stats(&mut self) -> DecoderStats {
        std::mem::take(&mut self.stats)
    }

    /// True while a frame is partially buffered or awaiting lookahead
    pub fn is_mid_frame(&self) -> bool {
        !self.buf.is_empty() || self.held.is_some()
    }

    fn step(&mut self, byte: u8, out: &mut Vec<[u8; 4]>) {
        if let Some(candidate) = self.held.take() {
            if byte == FRAME_MARKER {
                self.emit(&candidate, out);
                self.buf.push(FRAME_MARKER);
            } else {
                self.stats.discarded_frames += 1;
                trace!(?candidate, "Discarding ambiguous frame");
                for &b in &candidate[1..] {
                    self.step(b, out);
                }
                self.step(byte, out);
            }
            return;
        }

        if self.buf.is_empty() {
            if byte == FRAME_MARKER {
                self.buf.push(byte);
            } else {
                self.stats.skipped_bytes += 1;
            }
            return;
        }

        self.buf.push(byte);
        if self.buf.len() < FRAME_LEN {
            return;
        }

        let mut candidate = [0u8; FRAME_LEN];
        candidate.copy_from_slice(&self.buf);
        self.buf.clear();

        if candidate[1..].contains(&FRAME_MARKER) {
            self.held = Some(candidate);
        } else {
            self.emit(&candidate, out);
        }
    }

    fn emit(&mut self, candidate: &[u8; FRAME_LEN], out: &mut Vec<[u8; 4]>) {
        self.stats.frames += 1;
        out.push([candidate[1], candidate[2], candidate[3], candidate[4]]);
    }
}
