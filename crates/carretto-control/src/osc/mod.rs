//! OSC message channel to the synthesis engine
//!
//! - [`client`]: typed outbound sends with per-address type locking
//! - [`server`]: inbound feedback decoding
//! - [`address`]: the `/carretto/*` address space
//! - [`types`]: value conversion

pub mod address;
pub mod client;
pub mod server;
pub mod types;

pub use address::{parse_osc_address, CarrettoAddress};
pub use client::OscClient;
pub use server::{decode_feedback, decode_packet, FeedbackCommand, FeedbackEvent, OscServer};
pub use types::{OscValue, ValueKind};
