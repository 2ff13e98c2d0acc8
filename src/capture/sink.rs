use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rayon::prelude::*;

use crate::capture::target::OutputTarget;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MovieError, MovieResult};
use crate::foundation::math::blend_u8;
use crate::scene::handle::FrameRGBA;

/// Configuration provided to a [`FrameSink`] at the start of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Directory receiving frame files.
    pub output_dir: PathBuf,
    /// Targets every frame is written at.
    pub targets: Vec<OutputTarget>,
}

/// One frame resampled to one target.
#[derive(Debug, Clone)]
pub struct TargetFrame {
    /// Target this frame was produced for.
    pub target: OutputTarget,
    /// Pixels at `target.size`.
    pub frame: FrameRGBA,
}

/// Sink contract for consuming captured frames.
///
/// Ordering contract: `push_frames` is called in strictly increasing `FrameIndex` order, once
/// per index, with one [`TargetFrame`] for every configured target.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> MovieResult<()>;
    /// Push every target's pixels for frame `idx`. Returns only after all of them are stored.
    fn push_frames(&mut self, idx: FrameIndex, frames: &[TargetFrame]) -> MovieResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> MovieResult<()>;
}

/// Writes `Frame_<TAG>_<NNNNN>.png` files, encoding the targets of one frame in parallel.
#[derive(Debug)]
pub struct PngSequenceSink {
    bg_rgb: [u8; 3],
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
    written: u64,
}

impl Default for PngSequenceSink {
    fn default() -> Self {
        Self::new([0, 0, 0])
    }
}

impl PngSequenceSink {
    /// Create a sink that flattens transparency over `bg_rgb`.
    pub fn new(bg_rgb: [u8; 3]) -> Self {
        Self {
            bg_rgb,
            cfg: None,
            last_idx: None,
            written: 0,
        }
    }

    /// Number of files written since `begin`.
    pub fn files_written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self, cfg: SinkConfig) -> MovieResult<()> {
        if !cfg.output_dir.is_dir() {
            return Err(MovieError::validation(format!(
                "output directory '{}' does not exist",
                cfg.output_dir.display()
            )));
        }
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.written = 0;
        Ok(())
    }

    fn push_frames(&mut self, idx: FrameIndex, frames: &[TargetFrame]) -> MovieResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| MovieError::encode("png sink not started"))?;
        if let Some(last) = self.last_idx
            && idx <= last
        {
            return Err(MovieError::encode(format!(
                "png sink received out-of-order frame index {} after {}",
                idx.0, last.0
            )));
        }

        let bg = self.bg_rgb;
        let dir = cfg.output_dir.as_path();
        frames
            .par_iter()
            .map(|tf| write_png(&dir.join(tf.target.frame_file_name(idx)), &tf.frame, bg))
            .collect::<MovieResult<Vec<()>>>()?;

        self.last_idx = Some(idx);
        self.written += frames.len() as u64;
        Ok(())
    }

    fn end(&mut self) -> MovieResult<()> {
        if let Some(cfg) = self.cfg.take() {
            tracing::debug!(
                files = self.written,
                dir = %cfg.output_dir.display(),
                "png sequence finished"
            );
        }
        Ok(())
    }
}

fn write_png(path: &Path, frame: &FrameRGBA, bg_rgb: [u8; 3]) -> MovieResult<()> {
    let rgb = flatten_over_bg_to_rgb8(&frame.data, bg_rgb)?;
    image::save_buffer_with_format(
        path,
        &rgb,
        frame.width,
        frame.height,
        image::ColorType::Rgb8,
        image::ImageFormat::Png,
    )
    .map_err(|e| MovieError::encode(format!("write frame '{}': {e}", path.display())))
}

/// Composite straight-alpha RGBA8 over an opaque background, dropping the alpha channel.
fn flatten_over_bg_to_rgb8(src: &[u8], bg_rgb: [u8; 3]) -> MovieResult<Vec<u8>> {
    if !src.len().is_multiple_of(4) {
        return Err(MovieError::encode("rgba8 buffer length must be a multiple of 4"));
    }
    let mut out = Vec::with_capacity(src.len() / 4 * 3);
    for px in src.chunks_exact(4) {
        let a = px[3];
        for c in 0..3 {
            out.push(if a == 255 { px[c] } else { blend_u8(bg_rgb[c], px[c], a) });
        }
    }
    Ok(out)
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, Vec<TargetFrame>)>,
    ended: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, Vec<TargetFrame>)] {
        &self.frames
    }

    /// Whether `end` was called after the last `begin`.
    pub fn ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> MovieResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frames(&mut self, idx: FrameIndex, frames: &[TargetFrame]) -> MovieResult<()> {
        self.frames.push((idx, frames.to_vec()));
        Ok(())
    }

    fn end(&mut self) -> MovieResult<()> {
        self.ended = true;
        Ok(())
    }
}

/// Shared sinks stay inspectable by their other owners while a capture drives them.
impl<S: FrameSink> FrameSink for Arc<Mutex<S>> {
    fn begin(&mut self, cfg: SinkConfig) -> MovieResult<()> {
        lock_sink(&**self)?.begin(cfg)
    }

    fn push_frames(&mut self, idx: FrameIndex, frames: &[TargetFrame]) -> MovieResult<()> {
        lock_sink(&**self)?.push_frames(idx, frames)
    }

    fn end(&mut self) -> MovieResult<()> {
        lock_sink(&**self)?.end()
    }
}

fn lock_sink<S>(sink: &Mutex<S>) -> MovieResult<MutexGuard<'_, S>> {
    sink.lock().map_err(|_| MovieError::encode("frame sink lock poisoned"))
}

#[cfg(test)]
#[path = "../../tests/unit/capture/sink.rs"]
mod tests;
