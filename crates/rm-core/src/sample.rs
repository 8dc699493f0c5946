//! Sample resolution and level conversions

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Floating-point working sample (normalized to [-1, 1] full scale)
pub type Sample = f64;

/// Integer quantization resolution of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitDepth {
    Bits8,
    Bits16,
    Bits24,
    Bits32,
}

impl Default for BitDepth {
    fn default() -> Self {
        Self::Bits16
    }
}

impl BitDepth {
    /// Parse from a bits-per-sample count
    pub fn from_bits(bits: u16) -> CoreResult<Self> {
        match bits {
            8 => Ok(Self::Bits8),
            16 => Ok(Self::Bits16),
            24 => Ok(Self::Bits24),
            32 => Ok(Self::Bits32),
            other => Err(CoreError::UnsupportedBitDepth(other)),
        }
    }

    #[inline]
    pub fn bits(self) -> u16 {
        match self {
            Self::Bits8 => 8,
            Self::Bits16 => 16,
            Self::Bits24 => 24,
            Self::Bits32 => 32,
        }
    }

    /// Full-scale magnitude, 2^(bits-1)
    #[inline]
    pub fn full_scale(self) -> f64 {
        (1i64 << (self.bits() - 1)) as f64
    }

    /// Largest representable positive value
    #[inline]
    pub fn max_value(self) -> i32 {
        ((1i64 << (self.bits() - 1)) - 1) as i32
    }

    /// Most negative representable value
    #[inline]
    pub fn min_value(self) -> i32 {
        (-(1i64 << (self.bits() - 1))) as i32
    }

    /// Quantize a normalized sample, clipping to the representable range
    #[inline]
    pub fn quantize(self, sample: Sample) -> i32 {
        let scaled = (sample * self.full_scale()).round();
        scaled.clamp(self.min_value() as f64, self.max_value() as f64) as i32
    }

    /// Clip an integer to the representable range
    #[inline]
    pub fn clip(self, value: i64) -> i32 {
        value.clamp(self.min_value() as i64, self.max_value() as i64) as i32
    }

    /// Normalize an integer sample to [-1, 1]
    #[inline]
    pub fn normalize(self, value: i32) -> Sample {
        value as f64 / self.full_scale()
    }
}

/// Convert dB to linear gain
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear gain to dB (-inf for zero)
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bit_depth_ranges() {
        assert_eq!(BitDepth::Bits16.max_value(), 32767);
        assert_eq!(BitDepth::Bits16.min_value(), -32768);
        assert_eq!(BitDepth::Bits24.max_value(), 8_388_607);
        assert_eq!(BitDepth::Bits32.min_value(), i32::MIN);
        assert!(BitDepth::from_bits(12).is_err());
    }

    #[test]
    fn test_quantize_clips() {
        assert_eq!(BitDepth::Bits16.quantize(2.0), 32767);
        assert_eq!(BitDepth::Bits16.quantize(-2.0), -32768);
        assert_eq!(BitDepth::Bits16.quantize(0.5), 16384);
    }

    #[test]
    fn test_db_conversions() {
        assert_relative_eq!(db_to_linear(-6.0206), 0.5, epsilon = 1e-4);
        assert_relative_eq!(linear_to_db(0.5), -6.0206, epsilon = 1e-3);
        assert_eq!(linear_to_db(0.0), f64::NEG_INFINITY);
    }
}
