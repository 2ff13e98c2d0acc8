use super::*;

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let s = Settings::load(&dir.path().join("absent.json")).unwrap();
    assert_eq!(s, Settings::default());
    assert_eq!(s.targets.tags(), vec![TargetTag::Hd]);
    assert_eq!(s.viewport, Size::new(1280, 720));
}

#[test]
fn partial_file_fills_remaining_keys_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{ "output_dir": "/tmp/movie", "targets": { "half": true }, "quality": { "shadows": true } }"#,
    )
    .unwrap();

    let s = Settings::load(&path).unwrap();
    assert_eq!(s.output_dir, PathBuf::from("/tmp/movie"));
    assert_eq!(s.targets.tags(), vec![TargetTag::Hd, TargetTag::Half]);
    assert!(s.quality.shadows);
    assert_eq!(s.quality.motion_blur, MotionBlur::default());
    assert_eq!(s.camera, CameraPose::default());
    assert_eq!(s.encoder_path, PathBuf::from("ffmpeg"));
}

#[test]
fn save_then_load_preserves_camera() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.json");
    let mut s = Settings::default();
    s.camera = CameraPose {
        position: DVec3::new(0.0, 10.0, 10.0),
        focal_point: DVec3::new(1.0, 0.0, 0.0),
        zoom: 2.0,
        roll: 15.0,
    };
    s.save(&path).unwrap();

    assert!(!path.with_extension("json.tmp").exists());
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"focal_point\""));
    assert_eq!(Settings::load(&path).unwrap(), s);
}

#[test]
fn malformed_file_is_a_serde_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(Settings::load(&path), Err(MovieError::Serde(_))));
}

#[test]
fn quality_toggles_report_zero_when_disabled() {
    let mut q = RenderQuality::default();
    assert_eq!(q.motion_blur_frames(), 0);
    assert_eq!(q.anti_alias_samples(), 0);
    q.motion_blur.enabled = true;
    q.anti_alias.enabled = true;
    assert_eq!(q.motion_blur_frames(), 5);
    assert_eq!(q.anti_alias_samples(), 8);
}

#[test]
fn camera_validation() {
    assert!(CameraPose::default().validate().is_ok());
    let degenerate = CameraPose {
        position: DVec3::ZERO,
        ..CameraPose::default()
    };
    assert!(degenerate.validate().is_err());
    let bad_zoom = CameraPose {
        zoom: 0.0,
        ..CameraPose::default()
    };
    assert!(bad_zoom.validate().is_err());
}

#[test]
fn empty_selection_has_no_tags() {
    assert!(TargetSelection::none().tags().is_empty());
}
