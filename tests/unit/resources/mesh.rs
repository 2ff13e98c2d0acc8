use super::*;

/// Axis-aligned unit cube, 12 triangles.
fn cube() -> Mesh {
    let p = |x: f64, y: f64, z: f64| DVec3::new(x, y, z);
    let positions = vec![
        p(0.0, 0.0, 0.0),
        p(1.0, 0.0, 0.0),
        p(1.0, 1.0, 0.0),
        p(0.0, 1.0, 0.0),
        p(0.0, 0.0, 1.0),
        p(1.0, 0.0, 1.0),
        p(1.0, 1.0, 1.0),
        p(0.0, 1.0, 1.0),
    ];
    let triangles = vec![
        [0, 1, 2],
        [0, 2, 3],
        [4, 6, 5],
        [4, 7, 6],
        [0, 5, 1],
        [0, 4, 5],
        [3, 2, 6],
        [3, 6, 7],
        [0, 3, 7],
        [0, 7, 4],
        [1, 5, 6],
        [1, 6, 2],
    ];
    Mesh::new(positions, triangles).unwrap()
}

#[test]
fn new_rejects_out_of_range_indices() {
    let err = Mesh::new(vec![DVec3::ZERO], vec![[0, 0, 1]]).unwrap_err();
    assert!(matches!(err, MovieError::Resource(_)));
}

#[test]
fn cube_cut_through_middle_is_one_closed_square() {
    let c = cube().contour(Axis::Y, 0.5);
    assert_eq!(c.loops.len(), 1);
    let ring = &c.loops[0];
    assert!(ring.closed);
    assert_eq!(ring.points.len(), 8);
    for p in &ring.points {
        assert!((p.y - 0.5).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&p.x));
        assert!((0.0..=1.0).contains(&p.z));
    }
}

#[test]
fn plane_outside_mesh_yields_empty_contour() {
    let c = cube().contour(Axis::Z, 2.0);
    assert!(c.is_empty());
    assert_eq!(c.point_count(), 0);
}

#[test]
fn append_reindexes_triangles() {
    let mut a = cube();
    let b = cube();
    a.append(&b);
    assert_eq!(a.positions.len(), 16);
    assert_eq!(a.triangles.len(), 24);
    assert_eq!(a.triangles[12], [8, 9, 10]);
    let bounds = a.bounds().unwrap();
    assert_eq!(bounds.max, DVec3::ONE);
}

#[test]
fn load_obj_reads_and_triangulates_quads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quad.obj");
    std::fs::write(
        &path,
        "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n",
    )
    .unwrap();

    let mesh = Mesh::load_obj(&path).unwrap();
    assert_eq!(mesh.positions.len(), 4);
    assert_eq!(mesh.triangles.len(), 2);
    assert_eq!(mesh.bounds().unwrap().extent(Axis::Y), 1.0);
}

#[test]
fn load_obj_missing_file_names_the_path() {
    let err = Mesh::load_obj(Path::new("/definitely/not/here/rhmesh.obj")).unwrap_err();
    assert!(err.to_string().contains("rhmesh.obj"));
}
