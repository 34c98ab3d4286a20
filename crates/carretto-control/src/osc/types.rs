//! OSC type conversion helpers

use crate::{error::ControlError, Result};
use rosc::OscType;
use std::fmt;

/// Value kinds an outbound address can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Float,
    Int,
    Str,
    FloatList,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Float => "float",
            ValueKind::Int => "int",
            ValueKind::Str => "string",
            ValueKind::FloatList => "float list",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outbound message value
#[derive(Debug, Clone, PartialEq)]
pub enum OscValue {
    Float(f32),
    Int(i32),
    Str(String),
    FloatList(Vec<f32>),
}

impl OscValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            OscValue::Float(_) => ValueKind::Float,
            OscValue::Int(_) => ValueKind::Int,
            OscValue::Str(_) => ValueKind::Str,
            OscValue::FloatList(_) => ValueKind::FloatList,
        }
    }

    /// Reject non-finite floats before they reach the wire
    pub fn validate(&self) -> Result<()> {
        let finite = match self {
            OscValue::Float(f) => f.is_finite(),
            OscValue::FloatList(list) => list.iter().all(|f| f.is_finite()),
            OscValue::Int(_) | OscValue::Str(_) => true,
        };
        if finite {
            Ok(())
        } else {
            Err(ControlError::InvalidParameter(format!(
                "Non-finite value: {:?}",
                self
            )))
        }
    }

    /// OSC arguments; a list becomes one float argument per element
    pub fn to_osc_args(&self) -> Vec<OscType> {
        match self {
            OscValue::Float(f) => vec![OscType::Float(*f)],
            OscValue::Int(i) => vec![OscType::Int(*i)],
            OscValue::Str(s) => vec![OscType::String(s.clone())],
            OscValue::FloatList(list) => list.iter().map(|f| OscType::Float(*f)).collect(),
        }
    }
}

/// Numeric argument as `f32`, accepting every numeric OSC type
pub fn osc_to_f32(arg: &OscType) -> Result<f32> {
    let value = match arg {
        OscType::Float(f) => *f,
        OscType::Double(d) => *d as f32,
        OscType::Int(i) => *i as f32,
        OscType::Long(l) => *l as f32,
        other => {
            return Err(ControlError::InvalidMessage(format!(
                "Expected a number, got {:?}",
                other
            )))
        }
    };
    if !value.is_finite() {
        return Err(ControlError::InvalidMessage(format!(
            "Non-finite number: {}",
            value
        )));
    }
    Ok(value)
}

/// String argument
pub fn osc_to_string(arg: &OscType) -> Result<String> {
    match arg {
        OscType::String(s) => Ok(s.clone()),
        other => Err(ControlError::InvalidMessage(format!(
            "Expected a string, got {:?}",
            other
        ))),
    }
}

/// First argument as `f32`
pub fn first_f32(args: &[OscType]) -> Result<f32> {
    args.first()
        .ok_or_else(|| ControlError::InvalidMessage("No OSC arguments".to_string()))
        .and_then(osc_to_f32)
}

/// First argument as a string
pub fn first_string(args: &[OscType]) -> Result<String> {
    args.first()
        .ok_or_else(|| ControlError::InvalidMessage("No OSC arguments".to_string()))
        .and_then(osc_to_string)
}
