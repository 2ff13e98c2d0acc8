use super::*;

fn resources() -> ResourceSet {
    let mesh = Mesh::new(
        vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(10.0, 0.0, 0.0),
            DVec3::new(0.0, 10.0, 0.0),
            DVec3::new(0.0, 0.0, 10.0),
        ],
        vec![[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]],
    )
    .unwrap();
    let volume = Volume::new([4, 4, 4], DVec3::splat(3.0), DVec3::ZERO, vec![200; 64]).unwrap();
    ResourceSet {
        mesh,
        volume,
        overlay_volume: None,
        logos: vec![RgbaImage::from_pixel(4, 2, Rgba([0, 0, 255, 255]))],
    }
}

fn lit_pixels(frame: &FrameRGBA) -> usize {
    frame
        .data
        .chunks_exact(4)
        .filter(|px| px[..3] != BACKGROUND[..3])
        .count()
}

#[test]
fn renders_at_magnified_size() {
    let mut scene = SoftwareScene::new(resources(), Size::new(64, 36)).unwrap();
    assert_eq!(scene.render(1).unwrap().size(), Size::new(64, 36));
    assert_eq!(scene.render(3).unwrap().size(), Size::new(192, 108));
}

#[test]
fn volume_is_drawn_and_fades_out() {
    let mut scene = SoftwareScene::new(resources(), Size::new(64, 36)).unwrap();
    scene.set_camera(&CameraPose {
        position: DVec3::new(0.0, 0.0, 50.0),
        focal_point: DVec3::ZERO,
        zoom: 1.0,
        roll: 0.0,
    })
    .unwrap();
    let logo_px = 4 * 2;
    assert!(lit_pixels(&scene.render(1).unwrap()) > logo_px);

    scene.set_opacity(SceneObject::Volume, 0.0).unwrap();
    assert_eq!(lit_pixels(&scene.render(1).unwrap()), logo_px);
}

#[test]
fn clip_plane_hides_mesh_vertices() {
    let mut scene = SoftwareScene::new(resources(), Size::new(64, 36)).unwrap();
    scene.set_opacity(SceneObject::Volume, 0.0).unwrap();
    scene.set_opacity(SceneObject::Mesh, 1.0).unwrap();
    let visible = lit_pixels(&scene.render(1).unwrap());

    scene
        .set_clip_plane(ClipPlane {
            origin: DVec3::new(0.0, 100.0, 0.0),
            normal: DVec3::Y,
        })
        .unwrap();
    let clipped = lit_pixels(&scene.render(1).unwrap());
    assert!(clipped < visible);
}

#[test]
fn actors_are_centered_on_origin() {
    let scene = SoftwareScene::new(resources(), Size::new(8, 8)).unwrap();
    let b = scene.actor_bounds(SceneObject::Volume).unwrap();
    assert_eq!(b.center(), DVec3::ZERO);
    assert!(scene.contains(SceneObject::ClipPlane));
    assert!(!scene.contains(SceneObject::Overlay));
    assert!(scene.actor_bounds(SceneObject::Overlay).is_none());
}

#[test]
fn rotation_rejects_zero_axis_and_unknown_actor() {
    let mut scene = SoftwareScene::new(resources(), Size::new(8, 8)).unwrap();
    assert!(scene.set_rotation(SceneObject::Mesh, DVec3::ZERO, 10.0).is_err());
    assert!(scene.set_rotation(SceneObject::Overlay, DVec3::Z, 10.0).is_err());
    assert!(scene.set_rotation(SceneObject::Mesh, DVec3::Z, 10.0).is_ok());
}

fn facing_camera() -> CameraPose {
    CameraPose {
        position: DVec3::new(0.0, 0.0, 50.0),
        focal_point: DVec3::ZERO,
        zoom: 1.0,
        roll: 0.0,
    }
}

#[test]
fn point_smoothing_widens_volume_splats() {
    let mut scene = SoftwareScene::new(resources(), Size::new(64, 36)).unwrap();
    scene.set_camera(&facing_camera()).unwrap();
    let plain = lit_pixels(&scene.render(1).unwrap());

    let quality = RenderQuality {
        point_smoothing: true,
        ..RenderQuality::default()
    };
    scene.apply_quality(&quality, false).unwrap();
    assert!(lit_pixels(&scene.render(1).unwrap()) > plain);
}

#[test]
fn line_smoothing_widens_lines() {
    let mut scene = SoftwareScene::new(resources(), Size::new(64, 36)).unwrap();
    scene.set_camera(&facing_camera()).unwrap();
    scene.set_opacity(SceneObject::Volume, 0.0).unwrap();
    scene.apply_quality(&RenderQuality::default(), true).unwrap();
    let plain = lit_pixels(&scene.render(1).unwrap());

    let quality = RenderQuality {
        line_smoothing: true,
        ..RenderQuality::default()
    };
    scene.apply_quality(&quality, true).unwrap();
    assert!(lit_pixels(&scene.render(1).unwrap()) > plain);
}

#[test]
fn anti_aliasing_supersamples_at_the_same_size() {
    assert_eq!(supersample_factor(0), 1);
    assert_eq!(supersample_factor(8), 3);
    assert_eq!(supersample_factor(64), MAX_SUPERSAMPLE);

    let mut scene = SoftwareScene::new(resources(), Size::new(64, 36)).unwrap();
    scene.set_camera(&facing_camera()).unwrap();
    let plain = scene.render(1).unwrap();

    let mut quality = RenderQuality::default();
    quality.anti_alias.enabled = true;
    scene.apply_quality(&quality, false).unwrap();
    let smoothed = scene.render(1).unwrap();
    assert_eq!(smoothed.size(), plain.size());
    assert_ne!(smoothed.data, plain.data);
}

#[test]
fn motion_blur_keeps_a_trace_of_earlier_frames() {
    let mut scene = SoftwareScene::new(resources(), Size::new(64, 36)).unwrap();
    scene.set_camera(&facing_camera()).unwrap();
    let mut quality = RenderQuality::default();
    quality.motion_blur.enabled = true;
    scene.apply_quality(&quality, false).unwrap();

    let first = scene.render(1).unwrap();
    scene.set_opacity(SceneObject::Volume, 0.0).unwrap();
    let logo_px = 4 * 2;
    assert!(lit_pixels(&scene.render(1).unwrap()) > logo_px);

    scene.apply_quality(&RenderQuality::default(), false).unwrap();
    assert_eq!(lit_pixels(&scene.render(1).unwrap()), logo_px);
    assert!(lit_pixels(&first) > logo_px);
}
