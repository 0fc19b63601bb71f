//! Numeric identity and decimal rounding helpers
//!
//! Integers, floats and decimals that denote the same number must compare
//! equal and hash identically, regardless of scale (`3`, `3.0`, `3.00`).
//! Floats go through their shortest round-trip decimal text, so `0.1_f64`
//! is the decimal `0.1`, not its binary expansion.

use rust_decimal::{Decimal, RoundingStrategy};

/// Hash/equality key shared by all numeric value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NumericKey {
    /// Exactly representable as a decimal; always normalized (no trailing zeros, no -0)
    Exact(Decimal),
    /// Floats outside the decimal range, including NaN and infinities
    Bits(u64),
}

impl NumericKey {
    pub(crate) fn from_int(v: i64) -> Self {
        NumericKey::Exact(Decimal::from(v).normalize())
    }

    pub(crate) fn from_decimal(d: Decimal) -> Self {
        NumericKey::Exact(d.normalize())
    }

    pub(crate) fn from_float(f: f64) -> Self {
        if f.is_nan() {
            return NumericKey::Bits(f64::NAN.to_bits());
        }
        match float_to_decimal(f) {
            Some(d) => NumericKey::Exact(d.normalize()),
            None => NumericKey::Bits(f.to_bits()),
        }
    }
}

/// Converts a float through its shortest round-trip decimal text.
///
/// Returns `None` for non-finite values and for magnitudes a `Decimal`
/// cannot hold without losing digits.
pub(crate) fn float_to_decimal(f: f64) -> Option<Decimal> {
    if !f.is_finite() {
        return None;
    }
    Decimal::from_str_exact(&f.to_string()).ok()
}

/// Rounds a decimal half away from zero to `places` fractional digits
pub(crate) fn round_decimal(d: Decimal, places: u32) -> Decimal {
    d.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds a float half away from zero, judged on its decimal text.
///
/// `2.345_f64` is stored as 2.34499.. in binary; rounding its decimal text
/// gives `2.35` as a reader of the result set would expect.
pub(crate) fn round_float(f: f64, places: u32) -> f64 {
    if let Some(rounded) = float_to_decimal(f)
        .map(|d| round_decimal(d, places))
        .and_then(|d| d.to_string().parse::<f64>().ok())
    {
        return rounded;
    }
    if !f.is_finite() {
        return f;
    }
    // Out of decimal range: scale in binary
    let factor = 10f64.powi(places.min(308) as i32);
    let scaled = (f * factor).round() / factor;
    if scaled.is_finite() {
        scaled
    } else {
        f
    }
}
