use super::*;

#[test]
fn fps_rejects_zero() {
    assert!(Fps::new(0).is_err());
    assert_eq!(Fps::new(30).unwrap(), Fps::MOVIE);
    assert_eq!(Fps::MOVIE.frames_to_secs(1440), 48.0);
}

#[test]
fn size_helpers() {
    let hd = Size::new(1280, 720);
    assert_eq!(hd.halved(), Size::new(640, 360));
    assert_eq!(hd.magnified(3), Size::new(3840, 2160));
    assert_eq!(hd.to_arg(), "1280x720");
    assert_eq!(Size::new(2, 3).rgba_len(), 24);
}

#[test]
fn bounds_from_points_is_tight() {
    let pts = [
        DVec3::new(1.0, -2.0, 3.0),
        DVec3::new(-1.0, 5.0, 0.0),
        DVec3::new(0.0, 0.0, 9.0),
    ];
    let b = Bounds3::from_points(&pts).unwrap();
    assert_eq!(b.min, DVec3::new(-1.0, -2.0, 0.0));
    assert_eq!(b.max, DVec3::new(1.0, 5.0, 9.0));
    assert_eq!(b.extent(Axis::Y), 7.0);
    assert!(b.contains_on(Axis::Z, 9.0));
    assert!(!b.contains_on(Axis::Z, 9.5));
    assert!(Bounds3::from_points(&[] as &[DVec3]).is_none());
}

#[test]
fn bounds_new_rejects_inverted_corners() {
    assert!(Bounds3::new(DVec3::ONE, DVec3::ZERO).is_err());
}

#[test]
fn axis_plane_axes_are_perpendicular() {
    for axis in [Axis::X, Axis::Y, Axis::Z] {
        let (u, v) = axis.plane_axes();
        assert_ne!(u, axis);
        assert_ne!(v, axis);
        assert_ne!(u, v);
    }
    assert_eq!(Axis::Y.with(DVec3::ZERO, 4.0), DVec3::new(0.0, 4.0, 0.0));
}
