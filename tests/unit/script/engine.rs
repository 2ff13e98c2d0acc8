use super::*;
use std::time::Duration;

use crate::foundation::core::{Axis, DVec3, Size};
use crate::resources::mesh::Mesh;
use crate::resources::volume::Volume;
use crate::scene::handle::SceneObject;
use crate::scene::recording::{RecordingScene, SceneEvent};
use crate::script::stage::{CrossFade, ResliceSweep, RotationSweep, Stage};
use crate::sync::gate::GateSignal;

const WAIT: Duration = Duration::from_secs(5);

fn box_mesh() -> Mesh {
    let p = |x: f64, y: f64, z: f64| DVec3::new(x, y, z);
    Mesh::new(
        vec![
            p(0.0, 0.0, 0.0),
            p(4.0, 0.0, 0.0),
            p(4.0, 4.0, 0.0),
            p(0.0, 4.0, 0.0),
            p(0.0, 0.0, 4.0),
            p(4.0, 0.0, 4.0),
            p(4.0, 4.0, 4.0),
            p(0.0, 4.0, 4.0),
        ],
        vec![
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
        ],
    )
    .unwrap()
}

fn scene() -> Arc<Mutex<RecordingScene>> {
    let volume = Volume::new([5, 5, 5], DVec3::ONE, DVec3::ZERO, vec![100; 125]).unwrap();
    Arc::new(Mutex::new(RecordingScene::with_data(
        Size::new(4, 4),
        box_mesh(),
        volume,
    )))
}

fn engine(script: Script, scene: &Arc<Mutex<RecordingScene>>) -> (ScriptEngine, Arc<FrameGate>) {
    let gate = Arc::new(FrameGate::default());
    let shared: SharedScene = scene.clone();
    (ScriptEngine::new(script, shared, gate.clone()), gate)
}

/// Capture frames as the controller would, optionally cancelling after `cancel_after`.
fn drive(engine: &mut ScriptEngine, gate: &FrameGate, cancel_after: Option<u64>) -> (u64, RunReport) {
    let mut captured = 0;
    loop {
        match gate.wait_for_request(WAIT) {
            GateSignal::CaptureRequested => {
                captured += 1;
                if cancel_after == Some(captured) {
                    engine.cancel();
                }
                assert!(gate.release_frame());
            }
            GateSignal::Closed => return (captured, engine.join().unwrap()),
            GateSignal::TimedOut => panic!("script stalled"),
        }
    }
}

fn rotate(sweep_deg: f64) -> Stage {
    Stage::Rotate(RotationSweep {
        increment_deg: 1.0,
        sweep_deg,
        ..RotationSweep::default()
    })
}

#[test]
fn completed_run_reports_every_frame() {
    let scene = scene();
    let script = Script {
        stages: vec![rotate(10.0), Stage::StillWait { frames: 3 }],
    };
    let (mut engine, gate) = engine(script, &scene);
    let run = engine.start().unwrap();
    let (captured, report) = drive(&mut engine, &gate, None);

    assert_eq!(captured, 13);
    assert_eq!(report.run, run);
    assert_eq!(report.outcome, RunOutcome::Completed { frames: 13 });
    assert!(report.completed());
    assert_eq!(engine.state(), EngineState::Finished);
    assert_eq!(gate.stats().requests, 13);
    assert_eq!(gate.stats().releases, 13);

    let rotations: Vec<f64> = scene
        .lock()
        .unwrap()
        .events()
        .iter()
        .filter_map(|e| match e {
            SceneEvent::Rotation(SceneObject::Mesh, d) => Some(*d),
            _ => None,
        })
        .collect();
    assert_eq!(rotations.len(), 11);
    assert_eq!(rotations[9], 9.0);
    assert_eq!(rotations[10], 10.0);
}

#[test]
fn finished_is_terminal_until_restart() {
    let scene = scene();
    let (mut engine, gate) = engine(Script { stages: vec![rotate(2.0)] }, &scene);
    engine.start().unwrap();
    drive(&mut engine, &gate, None);
    assert!(engine.start().is_err());

    engine.restart().unwrap();
    assert_eq!(engine.state(), EngineState::Idle);
    let second = engine.start().unwrap();
    assert_eq!(second, RunId(1));
    let (captured, _) = drive(&mut engine, &gate, None);
    assert_eq!(captured, 2);
}

#[test]
fn cancel_allows_at_most_one_more_request() {
    let scene = scene();
    let (mut engine, gate) = engine(Script { stages: vec![rotate(360.0)] }, &scene);
    engine.start().unwrap();
    let (captured, report) = drive(&mut engine, &gate, Some(5));

    assert!(captured <= 6, "captured {captured} frames after cancelling at 5");
    assert_eq!(report.outcome, RunOutcome::Cancelled { frames: captured });
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(engine.error().is_none());
}

#[test]
fn cancel_while_blocked_reports_aborting_until_the_script_unwinds() {
    let scene = scene();
    let (mut engine, gate) = engine(Script { stages: vec![rotate(360.0)] }, &scene);
    engine.start().unwrap();
    assert_eq!(engine.state(), EngineState::Running);

    assert_eq!(gate.wait_for_request(WAIT), GateSignal::CaptureRequested);
    engine.cancel();
    assert_eq!(engine.state(), EngineState::Aborting);
    assert!(engine.has_worker());

    assert!(gate.release_frame());
    assert_eq!(gate.wait_for_request(WAIT), GateSignal::Closed);
    let report = engine.join().unwrap();
    assert_eq!(report.outcome, RunOutcome::Cancelled { frames: 1 });
    assert_eq!(engine.state(), EngineState::Idle);
}

#[test]
fn cancellation_is_seen_between_stages() {
    let scene = scene();
    let script = Script {
        stages: vec![Stage::StillWait { frames: 1 }, rotate(50.0)],
    };
    let (mut engine, gate) = engine(script, &scene);
    engine.start().unwrap();
    let (captured, report) = drive(&mut engine, &gate, Some(1));
    assert_eq!(captured, 1);
    assert_eq!(report.outcome, RunOutcome::Cancelled { frames: 1 });
    assert!(
        !scene
            .lock()
            .unwrap()
            .events()
            .iter()
            .any(|e| matches!(e, SceneEvent::Rotation(..)))
    );
}

#[test]
fn missing_scene_object_blocks_start() {
    let volume = Volume::new([1, 1, 1], DVec3::ONE, DVec3::ZERO, vec![0]).unwrap();
    let scene = Arc::new(Mutex::new(
        RecordingScene::with_data(Size::new(4, 4), box_mesh(), volume)
            .without(SceneObject::ClipPlane),
    ));
    let (mut engine, gate) = engine(Script::default_movie(), &scene);

    assert!(engine.error().unwrap().contains("clip_plane"));
    assert!(engine.start().is_err());
    assert!(!engine.has_worker());
    assert_eq!(gate.stats().requests, 0);
}

#[test]
fn stage_failure_is_reported_and_inspectable() {
    let scene = scene();
    let script = Script {
        stages: vec![Stage::CrossFade(CrossFade {
            step: 0.5,
            ..CrossFade::default()
        })],
    };
    let (mut engine, gate) = engine(script, &scene);
    engine.start().unwrap();

    // Swap the actors out while the first frame is pending so the next fade step fails.
    assert_eq!(gate.wait_for_request(WAIT), GateSignal::CaptureRequested);
    *scene.lock().unwrap() = RecordingScene::empty(Size::new(4, 4));
    assert!(gate.release_frame());
    assert_eq!(gate.wait_for_request(WAIT), GateSignal::Closed);

    let report = engine.join().unwrap();
    let RunOutcome::Failed(message) = &report.outcome else {
        panic!("expected failure, got {:?}", report.outcome);
    };
    assert!(message.contains("volume"));
    assert_eq!(engine.error().as_deref(), Some(message.as_str()));
    assert_eq!(engine.state(), EngineState::Idle);

    // The scene is still unusable, so a new start is refused and says why.
    assert!(engine.start().is_err());
    assert!(engine.error().unwrap().contains("volume"));
}

#[test]
fn reslice_stage_walks_down_and_back() {
    let scene = scene();
    let script = Script {
        stages: vec![Stage::Reslice(ResliceSweep {
            axis: Axis::Y,
            steps: 4,
            pause_frames: 2,
            overlay_weight: 0.5,
        })],
    };
    let (mut engine, gate) = engine(script, &scene);
    engine.start().unwrap();
    let (captured, report) = drive(&mut engine, &gate, None);

    // 5 forward + 2 paused + 4 back.
    assert_eq!(captured, 11);
    assert!(report.completed());
    let scene = scene.lock().unwrap();
    let positions: Vec<f64> = scene
        .events()
        .iter()
        .filter_map(|e| match e {
            SceneEvent::Slice { world_position, .. } => Some(*world_position),
            _ => None,
        })
        .collect();
    assert_eq!(positions, vec![4.0, 3.0, 2.0, 1.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
    let interior_loops = scene.events().iter().any(|e| {
        matches!(e, SceneEvent::Slice { world_position, loops: 1 } if *world_position == 2.0)
    });
    assert!(interior_loops);
    let clips = scene
        .events()
        .iter()
        .filter(|e| matches!(e, SceneEvent::Clip(_)))
        .count();
    assert_eq!(clips, 9);
}
