use super::*;

#[test]
fn cross_fade_steps_and_clamps_to_end() {
    let fade = CrossFade::default();
    let values = fade.values();
    assert_eq!(values.len(), 50);
    assert!((values[0] - 0.02).abs() < 1e-12);
    assert_eq!(*values.last().unwrap(), 1.0);
    assert!(values.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn cross_fade_runs_backwards_and_handles_uneven_steps() {
    let fade = CrossFade {
        from: 1.0,
        to: 0.0,
        step: 0.3,
        ..CrossFade::default()
    };
    let values = fade.values();
    assert_eq!(values.len(), 4);
    assert!((values[0] - 0.7).abs() < 1e-12);
    assert_eq!(values[3], 0.0);

    let flat = CrossFade {
        from: 0.5,
        to: 0.5,
        ..CrossFade::default()
    };
    assert!(flat.values().is_empty());
}

#[test]
fn rotation_sweep_is_open_interval() {
    let rot = RotationSweep::default();
    assert_eq!(rot.frame_count(), 1440);
    assert_eq!(rot.angle(0), 0.0);
    assert_eq!(rot.angle(1439), 359.75);

    let odd = RotationSweep {
        increment_deg: 0.7,
        ..RotationSweep::default()
    };
    let n = odd.frame_count();
    assert!(odd.angle(n - 1) < 360.0);
    assert!(odd.angle(n) >= 360.0);
}

#[test]
fn validation_rejects_bad_parameters() {
    let bad = [
        Stage::CrossFade(CrossFade {
            step: 0.0,
            ..CrossFade::default()
        }),
        Stage::CrossFade(CrossFade {
            to: 1.5,
            ..CrossFade::default()
        }),
        Stage::CrossFade(CrossFade {
            overlay: SceneObject::Volume,
            ..CrossFade::default()
        }),
        Stage::Rotate(RotationSweep {
            increment_deg: -1.0,
            ..RotationSweep::default()
        }),
        Stage::Rotate(RotationSweep {
            axis: DVec3::ZERO,
            ..RotationSweep::default()
        }),
        Stage::Rotate(RotationSweep {
            actors: vec![SceneObject::ClipPlane],
            ..RotationSweep::default()
        }),
        Stage::Reslice(ResliceSweep {
            steps: 0,
            ..ResliceSweep::default()
        }),
    ];
    for stage in bad {
        assert!(stage.validate().is_err(), "{stage:?} should be rejected");
    }
    assert!(Stage::StillWait { frames: 0 }.validate().is_ok());
}

#[test]
fn stages_deserialize_from_tagged_json() {
    let json = r#"[
        { "kind": "still_wait", "frames": 5 },
        { "kind": "cross_fade", "from": 1.0, "to": 0.0 },
        { "kind": "rotate", "axis": [0.0, 1.0, 0.0], "sweep_deg": 90.0 },
        { "kind": "reslice", "axis": "z", "steps": 10 }
    ]"#;
    let stages: Vec<Stage> = serde_json::from_str(json).unwrap();
    assert_eq!(stages[0], Stage::StillWait { frames: 5 });
    match &stages[1] {
        Stage::CrossFade(f) => {
            assert_eq!(f.step, 0.02);
            assert_eq!(f.base, SceneObject::Volume);
        }
        other => panic!("unexpected {other:?}"),
    }
    match &stages[2] {
        Stage::Rotate(r) => {
            assert_eq!(r.axis, DVec3::Y);
            assert_eq!(r.frame_count(), 360);
        }
        other => panic!("unexpected {other:?}"),
    }
    match &stages[3] {
        Stage::Reslice(r) => {
            assert_eq!(r.axis, Axis::Z);
            assert_eq!(r.pause_frames, 20);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn reslice_requires_the_full_scene() {
    let objects = Stage::Reslice(ResliceSweep::default()).required_objects();
    assert!(objects.contains(&SceneObject::ClipPlane));
    assert!(objects.contains(&SceneObject::SliceActor));
    assert!(!objects.contains(&SceneObject::Overlay));
}

#[test]
fn tiny_steps_are_rejected_before_any_frames_are_planned() {
    let fade = CrossFade {
        step: 1e-300,
        ..CrossFade::default()
    };
    let err = Stage::CrossFade(fade.clone()).validate().unwrap_err();
    assert!(err.to_string().contains("cross-fade"), "{err}");
    assert_eq!(fade.values().len() as u64, MAX_STAGE_FRAMES);

    let rot = RotationSweep {
        increment_deg: 1e-300,
        ..RotationSweep::default()
    };
    assert!(Stage::Rotate(rot.clone()).validate().is_err());
    assert_eq!(rot.frame_count(), MAX_STAGE_FRAMES);

    let reslice = ResliceSweep {
        steps: u32::MAX,
        ..ResliceSweep::default()
    };
    assert!(Stage::Reslice(reslice).validate().is_err());
    assert!(Stage::Rotate(RotationSweep::default()).validate().is_ok());
}
