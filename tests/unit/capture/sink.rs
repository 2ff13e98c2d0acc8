use super::*;
use crate::capture::target::TargetTag;
use crate::foundation::core::Size;

fn frames_for(tags: &[TargetTag], rgba: [u8; 4]) -> Vec<TargetFrame> {
    tags.iter()
        .map(|t| {
            let target = t.target(Size::new(8, 4));
            TargetFrame {
                target,
                frame: FrameRGBA::solid(target.size, rgba),
            }
        })
        .collect()
}

fn config(dir: &Path, tags: &[TargetTag]) -> SinkConfig {
    SinkConfig {
        output_dir: dir.to_path_buf(),
        targets: tags.iter().map(|t| t.target(Size::new(8, 4))).collect(),
    }
}

#[test]
fn png_sink_writes_every_target_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let tags = [TargetTag::Hd, TargetTag::Half];
    let mut sink = PngSequenceSink::default();
    sink.begin(config(dir.path(), &tags)).unwrap();
    sink.push_frames(FrameIndex(0), &frames_for(&tags, [10, 20, 30, 255]))
        .unwrap();
    sink.push_frames(FrameIndex(1), &frames_for(&tags, [10, 20, 30, 255]))
        .unwrap();
    sink.end().unwrap();

    assert_eq!(sink.files_written(), 4);
    for name in [
        "Frame_HD_00000.png",
        "Frame_HD_00001.png",
        "Frame_Half_00000.png",
        "Frame_Half_00001.png",
    ] {
        assert!(dir.path().join(name).is_file(), "{name} missing");
    }
    let img = image::open(dir.path().join("Frame_Half_00001.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(img.dimensions(), (4, 2));
    assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30]);
}

#[test]
fn png_sink_rejects_out_of_order_index() {
    let dir = tempfile::tempdir().unwrap();
    let tags = [TargetTag::Hd];
    let mut sink = PngSequenceSink::default();
    sink.begin(config(dir.path(), &tags)).unwrap();
    sink.push_frames(FrameIndex(3), &frames_for(&tags, [0; 4])).unwrap();
    assert!(sink.push_frames(FrameIndex(3), &frames_for(&tags, [0; 4])).is_err());
}

#[test]
fn png_sink_requires_existing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = PngSequenceSink::default();
    let err = sink
        .begin(config(&dir.path().join("nope"), &[TargetTag::Hd]))
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn flatten_blends_transparency_over_background() {
    let out = flatten_over_bg_to_rgb8(&[255, 255, 255, 0, 1, 2, 3, 255], [9, 9, 9]).unwrap();
    assert_eq!(out, vec![9, 9, 9, 1, 2, 3]);
    assert!(flatten_over_bg_to_rgb8(&[0, 0, 0], [0, 0, 0]).is_err());
}

#[test]
fn shared_in_memory_sink_is_visible_to_both_owners() {
    let shared = Arc::new(Mutex::new(InMemorySink::new()));
    let mut driver: Box<dyn FrameSink> = Box::new(shared.clone());
    driver
        .begin(config(Path::new("/unused"), &[TargetTag::Hd]))
        .unwrap();
    driver
        .push_frames(FrameIndex(0), &frames_for(&[TargetTag::Hd], [1; 4]))
        .unwrap();
    driver.end().unwrap();

    let sink = shared.lock().unwrap();
    assert!(sink.ended());
    assert_eq!(sink.frames().len(), 1);
    assert_eq!(sink.config().unwrap().targets.len(), 1);
}
