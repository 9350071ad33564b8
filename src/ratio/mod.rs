use std::fmt;

use crate::error::{Error, Result};

/// A decimal value with exactly two fractional digits, stored as an integer count of hundredths.
///
/// All figures are derived with integer arithmetic so that identical byte counts produce
/// identical output on every host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Hundredths(i128);

impl Hundredths {
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Hundredths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, magnitude / 100, magnitude % 100)
    }
}

/// Size-derived statistics of one compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratios {
    /// `original / compressed`
    pub ratio: Hundredths,
    /// Space saved, `(1 - compressed / original) * 100`. Negative when the codec expanded the input.
    pub percentage_saved: Hundredths,
    /// `compressed / original * 100`
    pub percentage_of_original: Hundredths,
}

impl Ratios {
    /// Space saved rendered the way it is persisted, e.g. `"94.30%"`.
    pub fn percentage_saved_label(&self) -> String {
        format!("{}%", self.percentage_saved)
    }
}

/// Computes the ratio figures for a compression of `original` bytes into `compressed` bytes.
///
/// Each quotient is cut to two decimals (digits past the second are dropped, toward zero).
pub fn compute(original: u64, compressed: u64) -> Result<Ratios> {
    if original == 0 || compressed == 0 {
        return Err(Error::DegenerateOutput { original, compressed });
    }
    let original = i128::from(original);
    let compressed = i128::from(compressed);

    Ok(Ratios {
        ratio: Hundredths(original * 100 / compressed),
        percentage_saved: Hundredths((original - compressed) * 10_000 / original),
        percentage_of_original: Hundredths(compressed * 10_000 / original),
    })
}
