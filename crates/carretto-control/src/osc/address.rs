//! OSC address space
//!
//! Parses addresses like `/carretto/bpm` into [`CarrettoAddress`] and maps each
//! outbound address to the one value kind it is ever sent with.

use super::types::ValueKind;
use crate::{error::ControlError, Result};

/// Root of every Carretto address
pub const ADDRESS_PREFIX: &str = "carretto";

/// Maximum length of an OSC address string
const MAX_OSC_ADDRESS_LENGTH: usize = 256;

/// Known addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CarrettoAddress {
    /// `/carretto/volume`
    Volume,
    /// `/carretto/bpm`
    Bpm,
    /// `/carretto/pattern` (genre name)
    Pattern,
    /// `/carretto/patternIdx`
    PatternIdx,
    /// `/carretto/beat`
    Beat,
    /// `/carretto/spectrum`
    Spectrum,
    /// `/carretto/ping`
    Ping,
    /// `/carretto/mode` (inbound only)
    Mode,
    /// `/carretto/command` (inbound only)
    Command,
}

impl CarrettoAddress {
    /// Addresses the client sends on
    pub const OUTBOUND: [CarrettoAddress; 7] = [
        CarrettoAddress::Volume,
        CarrettoAddress::Bpm,
        CarrettoAddress::Pattern,
        CarrettoAddress::PatternIdx,
        CarrettoAddress::Beat,
        CarrettoAddress::Spectrum,
        CarrettoAddress::Ping,
    ];

    /// Last path segment
    pub fn name(self) -> &'static str {
        match self {
            CarrettoAddress::Volume => "volume",
            CarrettoAddress::Bpm => "bpm",
            CarrettoAddress::Pattern => "pattern",
            CarrettoAddress::PatternIdx => "patternIdx",
            CarrettoAddress::Beat => "beat",
            CarrettoAddress::Spectrum => "spectrum",
            CarrettoAddress::Ping => "ping",
            CarrettoAddress::Mode => "mode",
            CarrettoAddress::Command => "command",
        }
    }

    /// Full OSC path
    pub fn path(self) -> String {
        format!("/{}/{}", ADDRESS_PREFIX, self.name())
    }

    /// Kind this address is always sent with; `None` for inbound-only addresses
    pub fn outbound_kind(self) -> Option<ValueKind> {
        match self {
            CarrettoAddress::Volume => Some(ValueKind::Float),
            CarrettoAddress::Bpm => Some(ValueKind::Int),
            CarrettoAddress::Pattern => Some(ValueKind::Str),
            CarrettoAddress::PatternIdx => Some(ValueKind::Int),
            CarrettoAddress::Beat => Some(ValueKind::Int),
            CarrettoAddress::Spectrum => Some(ValueKind::FloatList),
            CarrettoAddress::Ping => Some(ValueKind::Float),
            CarrettoAddress::Mode | CarrettoAddress::Command => None,
        }
    }
}

/// Parse an OSC address
pub fn parse_osc_address(address: &str) -> Result<CarrettoAddress> {
    if address.len() > MAX_OSC_ADDRESS_LENGTH {
        return Err(ControlError::InvalidMessage(format!(
            "OSC address too long (max {} chars)",
            MAX_OSC_ADDRESS_LENGTH
        )));
    }

    let parts: Vec<&str> = address.trim_start_matches('/').split('/').collect();

    if parts.is_empty() || parts[0] != ADDRESS_PREFIX {
        return Err(ControlError::InvalidMessage(format!(
            "OSC address must start with /{}: {}",
            ADDRESS_PREFIX, address
        )));
    }

    if parts.len() != 2 {
        return Err(ControlError::InvalidMessage(format!(
            "Invalid OSC address: {}",
            address
        )));
    }

    match parts[1] {
        "volume" => Ok(CarrettoAddress::Volume),
        "bpm" => Ok(CarrettoAddress::Bpm),
        "pattern" => Ok(CarrettoAddress::Pattern),
        "patternIdx" => Ok(CarrettoAddress::PatternIdx),
        "beat" => Ok(CarrettoAddress::Beat),
        "spectrum" => Ok(CarrettoAddress::Spectrum),
        "ping" => Ok(CarrettoAddress::Ping),
        "mode" => Ok(CarrettoAddress::Mode),
        "command" => Ok(CarrettoAddress::Command),
        other => Err(ControlError::InvalidMessage(format!(
            "Unknown OSC parameter: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known() {
        assert_eq!(parse_osc_address("/carretto/bpm").unwrap(), CarrettoAddress::Bpm);
        assert_eq!(
            parse_osc_address("/carretto/patternIdx").unwrap(),
            CarrettoAddress::PatternIdx
        );
        assert_eq!(
            parse_osc_address("/carretto/command").unwrap(),
            CarrettoAddress::Command
        );
    }

    #[test]
    fn test_path_round_trip() {
        for address in CarrettoAddress::OUTBOUND {
            assert_eq!(parse_osc_address(&address.path()).unwrap(), address);
        }
        assert_eq!(CarrettoAddress::Pattern.path(), "/carretto/pattern");
    }

    #[test]
    fn test_invalid_address() {
        assert!(parse_osc_address("/mapper/bpm").is_err());
        assert!(parse_osc_address("/carretto").is_err());
        assert!(parse_osc_address("/carretto/bpm/extra").is_err());
        assert!(parse_osc_address("/carretto/patternidx").is_err());
        assert!(parse_osc_address("/carretto/speed").is_err());
        assert!(parse_osc_address(&format!("/carretto/{}", "a".repeat(500))).is_err());
    }

    #[test]
    fn test_outbound_kinds() {
        assert_eq!(CarrettoAddress::Pattern.outbound_kind(), Some(ValueKind::Str));
        assert_eq!(CarrettoAddress::PatternIdx.outbound_kind(), Some(ValueKind::Int));
        assert_eq!(
            CarrettoAddress::Spectrum.outbound_kind(),
            Some(ValueKind::FloatList)
        );
        assert_eq!(CarrettoAddress::Mode.outbound_kind(), None);
        for address in CarrettoAddress::OUTBOUND {
            assert!(address.outbound_kind().is_some());
        }
    }
}
