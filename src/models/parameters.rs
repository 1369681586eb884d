use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ParameterError;

/// Smallest colour count the transformation service accepts
pub const MIN_COLORS: u8 = 2;
/// Largest colour count the transformation service accepts
pub const MAX_COLORS: u8 = 15;
/// Default colour count for a fresh session
pub const DEFAULT_COLORS: u8 = 2;
/// Default print size (stitches along the longer edge)
pub const DEFAULT_SIZE: u32 = 40;

/// Immutable snapshot of the user-tunable transformation parameters.
///
/// Fields are private so a value of this type always satisfies
/// `MIN_COLORS <= colors <= MAX_COLORS` and `size > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawParameters", into = "RawParameters")]
pub struct TransformParameters {
    colors: u8,
    size: u32,
}

impl TransformParameters {
    pub fn new(colors: i64, size: i64) -> Result<Self, ParameterError> {
        Ok(Self {
            colors: check_colors(colors)?,
            size: check_size(size)?,
        })
    }

    pub fn colors(&self) -> u8 {
        self.colors
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Copy with a different colour count
    pub fn with_colors(self, colors: i64) -> Result<Self, ParameterError> {
        Ok(Self {
            colors: check_colors(colors)?,
            ..self
        })
    }

    /// Copy with a different print size
    pub fn with_size(self, size: i64) -> Result<Self, ParameterError> {
        Ok(Self {
            size: check_size(size)?,
            ..self
        })
    }

    /// Re-check the invariants
    pub fn validate(&self) -> Result<(), ParameterError> {
        check_colors(self.colors as i64)?;
        check_size(self.size as i64)?;
        Ok(())
    }
}

impl Default for TransformParameters {
    fn default() -> Self {
        Self {
            colors: DEFAULT_COLORS,
            size: DEFAULT_SIZE,
        }
    }
}

impl fmt::Display for TransformParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "colors={} size={}", self.colors, self.size)
    }
}

fn check_colors(value: i64) -> Result<u8, ParameterError> {
    if (MIN_COLORS as i64..=MAX_COLORS as i64).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ParameterError::OutOfRange {
            field: "colors",
            value,
            min: MIN_COLORS as i64,
            max: MAX_COLORS as i64,
        })
    }
}

fn check_size(value: i64) -> Result<u32, ParameterError> {
    if value > 0 && value <= u32::MAX as i64 {
        Ok(value as u32)
    } else {
        Err(ParameterError::OutOfRange {
            field: "size",
            value,
            min: 1,
            max: u32::MAX as i64,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct RawParameters {
    colors: i64,
    size: i64,
}

impl TryFrom<RawParameters> for TransformParameters {
    type Error = ParameterError;

    fn try_from(raw: RawParameters) -> Result<Self, Self::Error> {
        Self::new(raw.colors, raw.size)
    }
}

impl From<TransformParameters> for RawParameters {
    fn from(params: TransformParameters) -> Self {
        Self {
            colors: params.colors as i64,
            size: params.size as i64,
        }
    }
}
