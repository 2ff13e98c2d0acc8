use std::collections::BTreeMap;
use std::path::Path;

use image::imageops::FilterType;

use crate::capture::sink::{FrameSink, SinkConfig, TargetFrame};
use crate::capture::target::{OutputRequest, OutputTarget};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MovieError, MovieResult};
use crate::scene::handle::{FrameRGBA, SceneHandle};

/// Render the current scene once per distinct magnification and resample to every target.
pub fn render_targets(
    scene: &mut dyn SceneHandle,
    targets: &[OutputTarget],
) -> MovieResult<Vec<TargetFrame>> {
    let mut renders = BTreeMap::<u32, FrameRGBA>::new();
    for t in targets {
        if !renders.contains_key(&t.magnification) {
            renders.insert(t.magnification, scene.render(t.magnification)?);
        }
    }

    targets
        .iter()
        .map(|t| {
            let src = renders
                .get(&t.magnification)
                .ok_or_else(|| MovieError::encode("missing render for target magnification"))?;
            let frame = if src.size() == t.size {
                src.clone()
            } else {
                let resized = image::imageops::resize(
                    &src.to_image()?,
                    t.size.width,
                    t.size.height,
                    FilterType::Lanczos3,
                );
                FrameRGBA::from_image(resized)
            };
            Ok(TargetFrame { target: *t, frame })
        })
        .collect()
}

/// Per-frame capture: render, resample, hand to the sink, advance the index.
pub struct FrameCapture {
    sink: Box<dyn FrameSink>,
    targets: Vec<OutputTarget>,
    next: FrameIndex,
    active: bool,
}

impl std::fmt::Debug for FrameCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCapture")
            .field("targets", &self.targets)
            .field("next", &self.next)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl FrameCapture {
    /// Create an idle capture writing through `sink`.
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Self {
            sink,
            targets: Vec::new(),
            next: FrameIndex(0),
            active: false,
        }
    }

    /// Start a new frame sequence at index 0.
    pub fn begin(&mut self, output_dir: &Path, request: &OutputRequest) -> MovieResult<()> {
        if self.active {
            self.end()?;
        }
        self.sink.begin(SinkConfig {
            output_dir: output_dir.to_path_buf(),
            targets: request.targets().to_vec(),
        })?;
        self.targets = request.targets().to_vec();
        self.next = FrameIndex(0);
        self.active = true;
        Ok(())
    }

    /// Capture the scene as frame [`FrameCapture::next_index`].
    ///
    /// The index advances only once every target has been stored.
    pub fn capture(&mut self, scene: &mut dyn SceneHandle) -> MovieResult<FrameIndex> {
        if !self.active {
            return Err(MovieError::encode("frame capture not started"));
        }
        let idx = self.next;
        let frames = render_targets(scene, &self.targets)?;
        self.sink.push_frames(idx, &frames)?;
        self.next = idx.next();
        tracing::trace!(frame = idx.0, "frame captured");
        Ok(idx)
    }

    /// Index the next captured frame will get.
    pub fn next_index(&self) -> FrameIndex {
        self.next
    }

    /// Targets of the current sequence.
    pub fn targets(&self) -> &[OutputTarget] {
        &self.targets
    }

    /// Whether a sequence is open.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Close the current sequence. A no-op when none is open.
    pub fn end(&mut self) -> MovieResult<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.sink.end()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/frames.rs"]
mod tests;
