//! Base-unit → human amount conversion.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Convert an exact base-unit amount into a human-readable value by scaling
/// down `decimals` places.
///
/// The integer → scaled-integer step is exact: the value goes through
/// `rust_decimal` (96-bit mantissa) when it fits, otherwise through integer
/// div/rem so the numerator is never rounded before the final division. Only
/// the final `f64` representation may be imprecise, which is acceptable — it
/// is display-only and never fed back into exact arithmetic.
///
/// Negative `decimals` clamps to 0.
pub fn humanize(raw: u128, decimals: i32) -> f64 {
    let decimals = decimals.max(0) as u32;
    if decimals == 0 {
        return raw as f64;
    }

    if raw <= i128::MAX as u128 && decimals <= 28 {
        if let Ok(d) = Decimal::try_from_i128_with_scale(raw as i128, decimals) {
            if let Some(f) = d.to_f64() {
                return f;
            }
        }
    }

    // Out of Decimal range: split into whole and fractional parts exactly,
    // then combine in floating point.
    match 10u128.checked_pow(decimals) {
        Some(divisor) => (raw / divisor) as f64 + (raw % divisor) as f64 / divisor as f64,
        None => raw as f64 * 10f64.powi(-(decimals as i32)),
    }
}
