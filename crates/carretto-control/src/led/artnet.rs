//! Art-Net pixel output (Art-Net 4, OpDmx)
//!
//! A strip is spread over consecutive universes, 170 RGB pixels each, starting
//! at its first universe.

use std::net::{SocketAddr, UdpSocket};

use super::{out_of_range, PixelStrip};
use crate::Result;
use carretto_core::{ColorOrder, Rgb};

/// RGB pixels that fit in one 512-channel universe
pub const PIXELS_PER_UNIVERSE: usize = 170;

const HEADER_LEN: usize = 18;

/// Build an Art-Net DMX packet (OpDmx)
///
/// `data` is padded to an even length as the protocol requires.
pub fn build_artnet_packet(universe: u16, sequence: u8, data: &[u8]) -> Vec<u8> {
    let len = (data.len().min(512) + 1) & !1;
    let mut packet = vec![0u8; HEADER_LEN + len];

    // Header: "Art-Net\0"
    packet[0..8].copy_from_slice(b"Art-Net\0");

    // OpCode: OpDmx (0x5000)
    packet[8..10].copy_from_slice(&0x5000u16.to_le_bytes());

    // Protocol version (14)
    packet[10..12].copy_from_slice(&14u16.to_be_bytes());

    packet[12] = sequence;
    // Physical
    packet[13] = 0;

    // Universe (Port-Address)
    packet[14..16].copy_from_slice(&universe.to_le_bytes());

    // Length (big-endian)
    packet[16..18].copy_from_slice(&(len as u16).to_be_bytes());

    let n = data.len().min(512);
    packet[HEADER_LEN..HEADER_LEN + n].copy_from_slice(&data[..n]);

    packet
}

/// Pixel strip streamed to an Art-Net controller
pub struct ArtNetStrip {
    socket: UdpSocket,
    target: SocketAddr,
    first_universe: u16,
    order: ColorOrder,
    brightness: f32,
    staged: Vec<Rgb>,
    shown: Vec<Rgb>,
    sequence: u8,
}

impl ArtNetStrip {
    /// Create a strip of `len` pixels
    ///
    /// # Arguments
    /// * `target` - Controller or broadcast address (typically `255.255.255.255:6454`)
    /// * `first_universe` - Universe of pixel 0
    /// * `brightness` - Global brightness, 0-255
    pub fn new(
        target: SocketAddr,
        first_universe: u16,
        len: usize,
        order: ColorOrder,
        brightness: u8,
    ) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;

        tracing::info!(
            "Art-Net strip of {} px on universe {}.. -> {}",
            len,
            first_universe,
            target
        );

        Ok(Self {
            socket,
            target,
            first_universe,
            order,
            brightness: brightness as f32 / 255.0,
            staged: vec![Rgb::OFF; len],
            shown: vec![Rgb::OFF; len],
            sequence: 0,
        })
    }

    /// Number of universes the strip spans
    pub fn universe_count(&self) -> usize {
        self.staged.len().div_ceil(PIXELS_PER_UNIVERSE)
    }

    /// Wire packets for the staged pixels, one per universe
    fn packets(&self) -> Vec<Vec<u8>> {
        self.staged
            .chunks(PIXELS_PER_UNIVERSE)
            .enumerate()
            .map(|(i, pixels)| {
                let data: Vec<u8> = pixels
                    .iter()
                    .flat_map(|c| c.scale(self.brightness).to_order(self.order))
                    .collect();
                let universe = self.first_universe.wrapping_add(i as u16);
                build_artnet_packet(universe, self.sequence, &data)
            })
            .collect()
    }
}

impl PixelStrip for ArtNetStrip {
    fn len(&self) -> usize {
        self.staged.len()
    }

    fn set_pixel(&mut self, index: usize, color: Rgb) -> Result<()> {
        let len = self.staged.len();
        let pixel = self
            .staged
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, len))?;
        *pixel = color;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for packet in self.packets() {
            self.socket.send_to(&packet, self.target)?;
        }
        self.sequence = self.sequence.wrapping_add(1);
        self.shown.copy_from_slice(&self.staged);

        tracing::trace!(
            "Sent Art-Net frame for universes {}..{}",
            self.first_universe,
            self.first_universe as usize + self.universe_count()
        );
        Ok(())
    }

    fn shown(&self) -> &[Rgb] {
        &self.shown
    }
}
