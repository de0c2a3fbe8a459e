use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Priority scores are stored in this form so that sorting a batch is a total,
/// platform-independent order.
pub type Fixed64 = I32F32;

/// Convert an f64 to Fixed64. Use only at the input boundary.
///
/// NaN maps to zero; out-of-range values saturate.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    if v.is_nan() {
        return Fixed64::ZERO;
    }
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and serialization.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}
