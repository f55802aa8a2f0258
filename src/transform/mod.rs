//! Color to luminance conversion
//!
//! The shell applies exactly one transform to every acquired image. The
//! luminance coefficients are selectable so the same code serves both the
//! BT.601 weighting used by common vision libraries and the BT.709 weighting.

pub mod grayscale;

use serde::Serialize;

/// Fixed-point precision of the luminance weights
pub(crate) const WEIGHT_SHIFT: u32 = 14;

/// Luminance coefficient presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LumaWeights {
    /// ITU-R BT.601: 0.299 R + 0.587 G + 0.114 B
    #[default]
    Bt601,
    /// ITU-R BT.709: 0.2126 R + 0.7152 G + 0.0722 B
    Bt709,
}

impl LumaWeights {
    /// Get the preset name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bt601 => "bt601",
            Self::Bt709 => "bt709",
        }
    }

    /// R, G, B weights scaled by 2^WEIGHT_SHIFT; each triple sums to exactly 2^WEIGHT_SHIFT
    pub(crate) fn fixed_point(&self) -> [u32; 3] {
        match self {
            Self::Bt601 => [4899, 9617, 1868],
            Self::Bt709 => [3483, 11718, 1183],
        }
    }
}

pub use grayscale::apply as to_grayscale;
