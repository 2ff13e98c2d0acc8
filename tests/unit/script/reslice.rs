use super::*;

fn bounds(lo: f64, hi: f64) -> Bounds3 {
    Bounds3::new(DVec3::splat(lo), DVec3::splat(hi)).unwrap()
}

fn frame(steps: u32) -> SweepFrame {
    SweepFrame::new(
        Axis::Y,
        bounds(0.0, 10.0),
        bounds(100.0, 110.0),
        bounds(-5.0, 15.0),
        bounds(95.0, 115.0),
        steps,
    )
    .unwrap()
}

#[test]
fn forward_pass_runs_from_top_to_first_at_or_below_bottom() {
    let f = frame(4);
    assert_eq!(f.step, 2.5);
    assert_eq!(f.forward_positions(), vec![110.0, 107.5, 105.0, 102.5, 100.0]);
}

#[test]
fn return_pass_mirrors_forward_without_repeating_bottom() {
    let f = frame(4);
    assert_eq!(f.return_positions(), vec![102.5, 105.0, 107.5, 110.0]);
}

#[test]
fn symmetry_holds_for_awkward_step_counts() {
    for steps in [3, 7, 400] {
        let f = frame(steps);
        let fwd = f.forward_positions();
        let back = f.return_positions();
        assert_eq!(fwd[0], f.start());
        assert!(*fwd.last().unwrap() <= f.end());
        assert!(fwd[..fwd.len() - 1].iter().all(|&p| p > f.end()));
        assert_eq!(fwd.len(), steps as usize + 1);
        for w in fwd.windows(2) {
            assert!((w[0] - w[1] - f.step).abs() < 1e-9);
        }
        assert_eq!(*back.last().unwrap(), f.start());
        let mut mirrored = back.clone();
        mirrored.reverse();
        assert_eq!(mirrored, fwd[..fwd.len() - 1].to_vec());
    }
}

#[test]
fn uneven_extent_stops_at_first_position_below_end() {
    let f = SweepFrame::new(
        Axis::Y,
        bounds(0.0, 10.0),
        Bounds3::new(DVec3::new(0.0, 0.0, 0.0), DVec3::new(1.0, 9.0, 1.0)).unwrap(),
        bounds(0.0, 10.0),
        bounds(0.0, 10.0),
        4,
    )
    .unwrap();
    assert_eq!(f.forward_positions(), vec![9.0, 6.5, 4.0, 1.5, -1.0]);
}

#[test]
fn coordinates_map_through_actor_offsets() {
    let f = frame(4);
    assert_eq!(f.world_to_mesh(100.0), 0.0);
    assert_eq!(f.world_to_mesh(110.0), 10.0);
    assert_eq!(f.world_to_volume(95.0), -5.0);
    assert_eq!(f.world_to_volume(105.0), 5.0);
}

#[test]
fn tex_coords_use_mesh_bounds_in_plane() {
    let f = frame(4);
    assert_eq!(f.tex_coord(DVec3::new(0.0, 3.0, 10.0)), [0.0, 1.0]);
    assert_eq!(f.tex_coord(DVec3::new(5.0, 3.0, 2.5)), [0.5, 0.25]);
    assert_eq!(f.tex_coord(DVec3::new(50.0, 3.0, -1.0)), [1.0, 0.0]);
}

#[test]
fn flat_mesh_and_zero_steps_are_rejected() {
    let flat = Bounds3::new(DVec3::ZERO, DVec3::new(1.0, 0.0, 1.0)).unwrap();
    assert!(SweepFrame::new(Axis::Y, flat, flat, flat, flat, 10).is_err());
    let b = bounds(0.0, 1.0);
    assert!(SweepFrame::new(Axis::Y, b, b, b, b, 0).is_err());
}
