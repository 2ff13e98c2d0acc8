use crate::foundation::error::{MovieError, MovieResult};

pub use glam::DVec3;

/// Absolute 0-based frame index within one animation run.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// The index that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Frames-per-second for encoded output. Movies are always produced at a whole-number rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps(pub u32);

impl Fps {
    /// Frame rate used for every encoded movie.
    pub const MOVIE: Fps = Fps(30);

    /// Create a validated FPS value.
    pub fn new(fps: u32) -> MovieResult<Self> {
        if fps == 0 {
            return Err(MovieError::validation("fps must be > 0"));
        }
        Ok(Self(fps))
    }

    /// Convert frame count to seconds.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        frames as f64 / f64::from(self.0)
    }
}

/// Pixel dimensions of a framebuffer or output target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a size from width and height.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Multiply both dimensions by an integer magnification.
    pub fn magnified(self, factor: u32) -> Self {
        Self {
            width: self.width.saturating_mul(factor),
            height: self.height.saturating_mul(factor),
        }
    }

    /// Halve both dimensions (integer division).
    pub fn halved(self) -> Self {
        Self {
            width: self.width / 2,
            height: self.height / 2,
        }
    }

    /// `WxH`, as passed to the encoder's `-s` flag.
    pub fn to_arg(self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Number of bytes in a tightly packed RGBA8 buffer of this size.
    pub fn rgba_len(self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

/// One of the three world axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
}

impl Axis {
    /// Component index (0, 1, 2).
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Unit vector along this axis.
    pub fn unit(self) -> DVec3 {
        match self {
            Self::X => DVec3::X,
            Self::Y => DVec3::Y,
            Self::Z => DVec3::Z,
        }
    }

    /// The two axes spanning a plane perpendicular to `self`, in (u, v) order.
    pub fn plane_axes(self) -> (Axis, Axis) {
        match self {
            Self::X => (Self::Y, Self::Z),
            Self::Y => (Self::X, Self::Z),
            Self::Z => (Self::X, Self::Y),
        }
    }

    /// Read this axis' component from a vector.
    pub fn of(self, v: DVec3) -> f64 {
        v[self.index()]
    }

    /// Return `v` with this axis' component replaced.
    pub fn with(self, mut v: DVec3, value: f64) -> DVec3 {
        v[self.index()] = value;
        v
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bounds3 {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl Bounds3 {
    /// Create bounds from two corners. Fails if `min` exceeds `max` on any axis.
    pub fn new(min: DVec3, max: DVec3) -> MovieResult<Self> {
        if min.x > max.x || min.y > max.y || min.z > max.z {
            return Err(MovieError::validation(format!(
                "invalid bounds: min {min} exceeds max {max}"
            )));
        }
        Ok(Self { min, max })
    }

    /// Tight bounds of a point set. Returns `None` for an empty set.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a DVec3>) -> Option<Self> {
        let mut it = points.into_iter();
        let first = *it.next()?;
        let (min, max) = it.fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Some(Self { min, max })
    }

    /// Lower bound along `axis`.
    pub fn lo(&self, axis: Axis) -> f64 {
        axis.of(self.min)
    }

    /// Upper bound along `axis`.
    pub fn hi(&self, axis: Axis) -> f64 {
        axis.of(self.max)
    }

    /// Extent along `axis`.
    pub fn extent(&self, axis: Axis) -> f64 {
        self.hi(axis) - self.lo(axis)
    }

    /// Closed-interval containment test along a single axis.
    pub fn contains_on(&self, axis: Axis, value: f64) -> bool {
        self.lo(axis) <= value && value <= self.hi(axis)
    }

    /// Center point.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Bounds shifted by `delta`.
    pub fn translated(&self, delta: DVec3) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// The eight corners, used for projection.
    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }
}

/// Identifies one animation run. Assigned by the engine, increasing across restarts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(pub u64);

/// Identifies one background resource-loading job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
