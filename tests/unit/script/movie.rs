use super::*;
use crate::foundation::core::{DVec3, Size};
use crate::resources::mesh::Mesh;
use crate::resources::volume::Volume;
use crate::scene::recording::RecordingScene;

fn full_scene() -> RecordingScene {
    let mesh = Mesh::new(vec![DVec3::ZERO, DVec3::ONE, DVec3::X], vec![[0, 1, 2]]).unwrap();
    let volume = Volume::new([1, 1, 1], DVec3::ONE, DVec3::ZERO, vec![0]).unwrap();
    RecordingScene::with_data(Size::new(4, 4), mesh, volume)
}

#[test]
fn default_movie_follows_standard_order() {
    let names: Vec<_> = Script::default_movie()
        .stages
        .iter()
        .map(Stage::name)
        .collect();
    assert_eq!(
        names,
        vec![
            "rotate",
            "still_wait",
            "cross_fade",
            "still_wait",
            "reslice",
            "still_wait",
            "cross_fade"
        ]
    );
    assert!(Script::default_movie().validate().is_ok());
}

#[test]
fn default_movie_fades_volume_back_in() {
    let script = Script::default_movie();
    let Some(Stage::CrossFade(last)) = script.stages.last() else {
        panic!("last stage should be a cross-fade");
    };
    assert_eq!(last.base, SceneObject::Volume);
    assert_eq!(last.values().last().copied(), Some(0.0));
}

#[test]
fn check_scene_lists_missing_objects() {
    let script = Script::default_movie();
    assert!(script.check_scene(&full_scene()).is_ok());

    let err = script
        .check_scene(&full_scene().without(SceneObject::SliceActor))
        .unwrap_err();
    assert!(err.to_string().contains("slice_actor"));
}

#[test]
fn load_round_trips_json_and_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movie.json");
    std::fs::write(
        &path,
        serde_json::to_string_pretty(&Script::default_movie()).unwrap(),
    )
    .unwrap();
    assert_eq!(Script::load(&path).unwrap(), Script::default_movie());

    std::fs::write(
        &path,
        r#"{ "stages": [ { "kind": "rotate", "increment_deg": 0.0 } ] }"#,
    )
    .unwrap();
    let err = Script::load(&path).unwrap_err();
    assert!(err.to_string().contains("stage 0 (rotate)"));
}
