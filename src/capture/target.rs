use serde::{Deserialize, Serialize};

use crate::foundation::core::{FrameIndex, Size};
use crate::foundation::error::{MovieError, MovieResult};

/// Size of the `4K` target.
pub const UHD: Size = Size::new(3840, 2160);

/// Output resolution tag. The tag string appears verbatim in frame and movie file names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetTag {
    /// Viewport resolution.
    #[serde(rename = "HD")]
    Hd,
    /// Half the viewport resolution.
    #[serde(rename = "Half")]
    Half,
    /// 3840x2160.
    #[serde(rename = "4K")]
    Uhd,
}

impl TargetTag {
    /// Tag string used in file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hd => "HD",
            Self::Half => "Half",
            Self::Uhd => "4K",
        }
    }

    /// Resolve this tag against the render viewport.
    pub fn target(self, viewport: Size) -> OutputTarget {
        match self {
            Self::Hd => OutputTarget {
                tag: self,
                size: viewport,
                magnification: 1,
            },
            Self::Half => OutputTarget {
                tag: self,
                size: viewport.halved(),
                magnification: 1,
            },
            Self::Uhd => OutputTarget {
                tag: self,
                size: UHD,
                magnification: UHD.width.div_ceil(viewport.width.max(1)).max(1),
            },
        }
    }
}

impl std::fmt::Display for TargetTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolution the capture step writes every frame at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputTarget {
    /// Resolution tag.
    pub tag: TargetTag,
    /// Pixel size of written frames.
    pub size: Size,
    /// Scene magnification to render at before any resampling.
    pub magnification: u32,
}

impl OutputTarget {
    /// File name of frame `idx` for this target.
    pub fn frame_file_name(&self, idx: FrameIndex) -> String {
        frame_file_name(self.tag, idx)
    }
}

/// `Frame_<TAG>_<NNNNN>.png`.
pub fn frame_file_name(tag: TargetTag, idx: FrameIndex) -> String {
    format!("Frame_{}_{:05}.png", tag.as_str(), idx.0)
}

/// printf-style input pattern matching [`frame_file_name`], as the encoder expects it.
pub fn frame_pattern(tag: TargetTag) -> String {
    format!("Frame_{}_%05d.png", tag.as_str())
}

/// `out_<TAG>.mp4`.
pub fn movie_file_name(tag: TargetTag) -> String {
    format!("out_{}.mp4", tag.as_str())
}

/// Non-empty, de-duplicated set of targets for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputRequest {
    targets: Vec<OutputTarget>,
}

impl OutputRequest {
    /// Resolve `tags` against `viewport`. Fails when nothing is selected.
    pub fn new(tags: &[TargetTag], viewport: Size) -> MovieResult<Self> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(MovieError::validation(format!(
                "viewport must be non-empty, got {}",
                viewport.to_arg()
            )));
        }
        let mut tags = tags.to_vec();
        tags.sort();
        tags.dedup();
        if tags.is_empty() {
            return Err(MovieError::validation("no output resolution selected"));
        }
        Ok(Self {
            targets: tags.into_iter().map(|t| t.target(viewport)).collect(),
        })
    }

    /// Targets in output order.
    pub fn targets(&self) -> &[OutputTarget] {
        &self.targets
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/target.rs"]
mod tests;
