pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Blend `src` over `dst` with coverage `alpha` in `0..=255`, straight alpha.
pub(crate) fn blend_u8(dst: u8, src: u8, alpha: u8) -> u8 {
    let a = u16::from(alpha);
    let inv = 255 - a;
    (mul_div255_u16(u16::from(src), a) + mul_div255_u16(u16::from(dst), inv)).min(255) as u8
}

/// Map `value` from `[lo, hi]` into `[0, 1]`. Degenerate ranges map to `0`.
pub(crate) fn unit_interval(value: f64, lo: f64, hi: f64) -> f64 {
    let span = hi - lo;
    if span.abs() <= f64::EPSILON {
        return 0.0;
    }
    ((value - lo) / span).clamp(0.0, 1.0)
}

/// Quantize an opacity in `[0, 1]` to an 8-bit alpha.
pub(crate) fn opacity_to_u8(opacity: f64) -> u8 {
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
