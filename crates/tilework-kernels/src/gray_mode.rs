//! `convert_to_gray`'s mode parameter.
//!
//! **Supplemented from `original_source`.** The distilled spec only
//! exercises `use_red` (S3/S4); the original's `convert_to_gray` algorithm
//! accepts five modes. All five are implemented here so the full algorithm
//! — not just the one mode the tests happen to cover — exists.

use tilework_core::error::{Error, Result};

/// How `convert_to_gray` combines RGB channels into one gray value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrayMode {
    /// Gray value is the red channel, unchanged.
    UseRed,
    /// Gray value is the green channel, unchanged.
    UseGreen,
    /// Gray value is the blue channel, unchanged.
    UseBlue,
    /// Gray value is the unweighted mean of the three channels.
    Average,
    /// Gray value is the ITU-R BT.601 luma weighting.
    Luminance,
}

impl GrayMode {
    /// Parses a script-level mode string, e.g. `"use_red"`.
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "use_red" => Ok(Self::UseRed),
            "use_green" => Ok(Self::UseGreen),
            "use_blue" => Ok(Self::UseBlue),
            "average" => Ok(Self::Average),
            "luminance" => Ok(Self::Luminance),
            other => Err(Error::invalid_parameter(
                "convert_to_gray.mode",
                format!(
                    "unknown mode '{other}', expected one of use_red, use_green, use_blue, average, luminance"
                ),
            )),
        }
    }

    /// Applies the mode to one RGB pixel.
    pub fn apply(&self, r: u8, g: u8, b: u8) -> u8 {
        match self {
            Self::UseRed => r,
            Self::UseGreen => g,
            Self::UseBlue => b,
            Self::Average => (((r as u32) + (g as u32) + (b as u32)) / 3) as u8,
            Self::Luminance => {
                let y = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
                y.round().clamp(0.0, 255.0) as u8
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_five_modes() {
        assert_eq!(GrayMode::parse("use_red").unwrap(), GrayMode::UseRed);
        assert_eq!(GrayMode::parse("use_green").unwrap(), GrayMode::UseGreen);
        assert_eq!(GrayMode::parse("use_blue").unwrap(), GrayMode::UseBlue);
        assert_eq!(GrayMode::parse("average").unwrap(), GrayMode::Average);
        assert_eq!(GrayMode::parse("luminance").unwrap(), GrayMode::Luminance);
    }

    #[test]
    fn unknown_mode_is_invalid_parameter() {
        let err = GrayMode::parse("mauve").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn use_red_passes_red_channel_through() {
        assert_eq!(GrayMode::UseRed.apply(10, 200, 30), 10);
    }

    #[test]
    fn average_rounds_toward_zero_via_integer_division() {
        assert_eq!(GrayMode::Average.apply(1, 1, 1), 1);
        assert_eq!(GrayMode::Average.apply(0, 0, 1), 0);
    }
}
