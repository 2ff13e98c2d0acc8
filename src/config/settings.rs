use std::fs::File;
use std::io::{BufReader, BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::capture::target::TargetTag;
use crate::foundation::core::{DVec3, Size};
use crate::foundation::error::{MovieError, MovieResult};

/// Persisted operator settings.
///
/// Stored as pretty-printed JSON so it stays human-editable. Every key is optional on disk:
/// missing keys take the defaults documented on each field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory receiving frame files and encoded movies. Default: `render`.
    pub output_dir: PathBuf,
    /// Encoder executable. Bare names are looked up on `PATH`. Default: `ffmpeg`.
    pub encoder_path: PathBuf,
    /// Enabled output resolutions. Default: HD only.
    pub targets: TargetSelection,
    /// Base render viewport. Default: 1280x720.
    pub viewport: Size,
    /// Renderer quality toggles.
    pub quality: RenderQuality,
    /// Whether the orientation axes overlay is drawn. Default: `false`.
    pub axes_visible: bool,
    /// Saved camera pose.
    pub camera: CameraPose,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("render"),
            encoder_path: PathBuf::from("ffmpeg"),
            targets: TargetSelection::default(),
            viewport: Size::new(1280, 720),
            quality: RenderQuality::default(),
            axes_visible: false,
            camera: CameraPose::default(),
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing file yields the defaults.
    #[tracing::instrument]
    pub fn load(path: &Path) -> MovieResult<Self> {
        if !path.exists() {
            tracing::debug!("settings file not found, using defaults");
            return Ok(Self::default());
        }
        let f = File::open(path).with_context(|| format!("open settings '{}'", path.display()))?;
        serde_json::from_reader(BufReader::new(f)).map_err(|e| {
            MovieError::serde(format!("parse settings '{}': {e}", path.display()))
        })
    }

    /// Write settings to `path` through a temporary file so a crash never leaves a torn file.
    #[tracing::instrument(skip(self))]
    pub fn save(&self, path: &Path) -> MovieResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create settings dir '{}'", parent.display()))?;
        }

        let tmp = path.with_extension("json.tmp");
        {
            let f = File::create(&tmp)
                .with_context(|| format!("create settings '{}'", tmp.display()))?;
            let mut w = BufWriter::new(f);
            serde_json::to_writer_pretty(&mut w, self)?;
            w.write_all(b"\n")
                .and_then(|_| w.flush())
                .with_context(|| format!("write settings '{}'", tmp.display()))?;
        }
        std::fs::rename(&tmp, path)
            .with_context(|| format!("replace settings '{}'", path.display()))?;
        tracing::debug!("settings saved");
        Ok(())
    }
}

/// Per-resolution enable flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSelection {
    /// Full viewport resolution (`HD`). Default: `true`.
    pub hd: bool,
    /// Half viewport resolution (`Half`). Default: `false`.
    pub half: bool,
    /// 3840x2160 (`4K`). Default: `false`.
    pub uhd: bool,
}

impl Default for TargetSelection {
    fn default() -> Self {
        Self {
            hd: true,
            half: false,
            uhd: false,
        }
    }
}

impl TargetSelection {
    /// Enabled tags in output order.
    pub fn tags(&self) -> Vec<TargetTag> {
        [
            (self.hd, TargetTag::Hd),
            (self.half, TargetTag::Half),
            (self.uhd, TargetTag::Uhd),
        ]
        .into_iter()
        .filter_map(|(on, tag)| on.then_some(tag))
        .collect()
    }

    /// A selection with nothing enabled.
    pub fn none() -> Self {
        Self {
            hd: false,
            half: false,
            uhd: false,
        }
    }
}

/// Renderer quality toggles applied to the scene before each run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderQuality {
    /// Point smoothing. Default: `false`.
    pub point_smoothing: bool,
    /// Line smoothing. Default: `false`.
    pub line_smoothing: bool,
    /// Polygon smoothing. Default: `false`.
    pub polygon_smoothing: bool,
    /// Shadows. Default: `false`.
    pub shadows: bool,
    /// Motion blur sub-frames.
    pub motion_blur: MotionBlur,
    /// Anti-alias accumulation samples.
    pub anti_alias: AntiAlias,
}

impl RenderQuality {
    /// Sub-frames to accumulate for motion blur, `0` when disabled.
    pub fn motion_blur_frames(&self) -> u32 {
        if self.motion_blur.enabled {
            self.motion_blur.frames
        } else {
            0
        }
    }

    /// Anti-alias samples, `0` when disabled.
    pub fn anti_alias_samples(&self) -> u32 {
        if self.anti_alias.enabled {
            self.anti_alias.samples
        } else {
            0
        }
    }
}

/// Motion blur toggle. Default: disabled, 5 frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionBlur {
    /// Whether motion blur is on.
    pub enabled: bool,
    /// Sub-frames per rendered frame.
    pub frames: u32,
}

impl Default for MotionBlur {
    fn default() -> Self {
        Self {
            enabled: false,
            frames: 5,
        }
    }
}

/// Anti-alias toggle. Default: disabled, 8 samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiAlias {
    /// Whether anti-aliasing is on.
    pub enabled: bool,
    /// Accumulation samples.
    pub samples: u32,
}

impl Default for AntiAlias {
    fn default() -> Self {
        Self {
            enabled: false,
            samples: 8,
        }
    }
}

/// Camera pose as saved by the operator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraPose {
    /// Eye position. Default: `[2, 3, -1]`.
    pub position: DVec3,
    /// Look-at point. Default: origin.
    pub focal_point: DVec3,
    /// Zoom factor applied after framing. Default: `1.3`.
    pub zoom: f64,
    /// Roll about the view direction in degrees. Default: `-90`.
    pub roll: f64,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: DVec3::new(2.0, 3.0, -1.0),
            focal_point: DVec3::ZERO,
            zoom: 1.3,
            roll: -90.0,
        }
    }
}

impl CameraPose {
    /// Reject poses that cannot produce a view.
    pub fn validate(&self) -> MovieResult<()> {
        if !(self.position - self.focal_point).is_finite()
            || (self.position - self.focal_point).length() <= f64::EPSILON
        {
            return Err(MovieError::validation(
                "camera position must differ from its focal point",
            ));
        }
        if !(self.zoom.is_finite() && self.zoom > 0.0) {
            return Err(MovieError::validation("camera zoom must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/settings.rs"]
mod tests;
