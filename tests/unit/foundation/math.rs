use super::*;

#[test]
fn mul_div255_rounds() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(128, 255), 128);
    assert_eq!(mul_div255_u8(255, 0), 0);
}

#[test]
fn blend_endpoints() {
    assert_eq!(blend_u8(10, 200, 255), 200);
    assert_eq!(blend_u8(10, 200, 0), 10);
}

#[test]
fn unit_interval_clamps_and_handles_degenerate_span() {
    assert_eq!(unit_interval(5.0, 0.0, 10.0), 0.5);
    assert_eq!(unit_interval(-3.0, 0.0, 10.0), 0.0);
    assert_eq!(unit_interval(30.0, 0.0, 10.0), 1.0);
    assert_eq!(unit_interval(1.0, 2.0, 2.0), 0.0);
}

#[test]
fn opacity_quantizes() {
    assert_eq!(opacity_to_u8(1.0), 255);
    assert_eq!(opacity_to_u8(0.0), 0);
    assert_eq!(opacity_to_u8(2.0), 255);
}
