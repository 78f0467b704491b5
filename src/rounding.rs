// =============================================================================
// Increment Rounding — align prices and sizes to exchange step sizes
// =============================================================================
//
// KuCoin rejects any order whose price is not a multiple of `priceIncrement`
// or whose size is not a multiple of `baseIncrement`. All arithmetic here is
// done in `rust_decimal::Decimal`, so a value already sitting on a tick never
// drifts to the tick below (or above) the way `f64` floor division can.
// =============================================================================

use rust_decimal::Decimal;

/// Round `value` down to the largest multiple of `increment` that is `<= value`.
///
/// A zero or negative `increment` returns `value` unchanged.
pub fn round_down(value: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return value;
    }
    // Remainder is exact and cannot overflow the way `value / increment` can
    // for large values over tiny steps. It takes the sign of `value`.
    let rem = value % increment;
    if rem < Decimal::ZERO {
        value - rem - increment
    } else {
        value - rem
    }
}

/// Render `value` with exactly as many decimal places as `increment` carries.
///
/// `value` is expected to be increment-aligned already, so the rescale only
/// pads trailing zeros (`0.0004` with a `0.00001` step renders as `0.00040`).
pub fn format_to_increment(value: Decimal, increment: Decimal) -> String {
    let mut out = value;
    out.rescale(increment.normalize().scale());
    out.to_string()
}
