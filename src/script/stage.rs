use serde::{Deserialize, Serialize};

use crate::foundation::core::{Axis, DVec3};
use crate::foundation::error::{MovieError, MovieResult};
use crate::scene::handle::{SceneHandle, SceneObject, SharedScene, with_scene};
use crate::sync::gate::FrameGate;

/// Most frames a single stage may render, a little over nine hours at 30 fps.
pub const MAX_STAGE_FRAMES: u64 = 1_000_000;

/// Frames needed to cover `span` in increments of `step`, as a float so huge counts stay
/// comparable against [`MAX_STAGE_FRAMES`] before any cast.
fn step_count(span: f64, step: f64) -> f64 {
    (span.abs() / step - 1e-9).ceil().max(0.0)
}

fn check_frame_budget(stage: &str, frames: f64) -> MovieResult<()> {
    if frames > MAX_STAGE_FRAMES as f64 {
        return Err(MovieError::script(format!(
            "{stage} would render {frames:.0} frames, more than {MAX_STAGE_FRAMES}"
        )));
    }
    Ok(())
}

/// Whether a stage ran to its end or stopped on cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Cancelled,
}

/// What a running stage can touch: the shared scene, the gate and the run's frame counter.
pub(crate) struct StageCtx<'a> {
    scene: &'a SharedScene,
    gate: &'a FrameGate,
    frames: u64,
}

impl<'a> StageCtx<'a> {
    pub(crate) fn new(scene: &'a SharedScene, gate: &'a FrameGate) -> Self {
        Self {
            scene,
            gate,
            frames: 0,
        }
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.gate.is_cancelled()
    }

    /// Mutate the scene. The lock is released before the next gate request.
    pub(crate) fn scene<R>(
        &self,
        f: impl FnOnce(&mut dyn SceneHandle) -> MovieResult<R>,
    ) -> MovieResult<R> {
        with_scene(self.scene, f)
    }

    /// End the current frame: hand it to the controller and wait until it is captured.
    pub(crate) fn frame(&mut self) -> MovieResult<Flow> {
        self.gate.request_capture()?;
        self.frames += 1;
        Ok(if self.cancelled() {
            Flow::Cancelled
        } else {
            Flow::Continue
        })
    }

    pub(crate) fn frames(&self) -> u64 {
        self.frames
    }

    /// Hold the scene unchanged for `frames` frames.
    pub(crate) fn hold(&mut self, frames: u32) -> MovieResult<Flow> {
        for _ in 0..frames {
            if self.cancelled() || self.frame()? == Flow::Cancelled {
                return Ok(Flow::Cancelled);
            }
        }
        Ok(Flow::Continue)
    }
}

/// One step of a movie script.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stage {
    /// Hold the scene for a number of frames.
    StillWait {
        /// Frames to hold.
        frames: u32,
    },
    /// Complementary opacity fade between two actors.
    CrossFade(CrossFade),
    /// Rotate actors about a fixed axis.
    Rotate(RotationSweep),
    /// Sweep a cutting plane through the mesh and volume and back.
    Reslice(ResliceSweep),
}

impl Stage {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StillWait { .. } => "still_wait",
            Self::CrossFade(_) => "cross_fade",
            Self::Rotate(_) => "rotate",
            Self::Reslice(_) => "reslice",
        }
    }

    /// Scene objects that must exist for this stage to run.
    pub fn required_objects(&self) -> Vec<SceneObject> {
        match self {
            Self::StillWait { .. } => Vec::new(),
            Self::CrossFade(f) => vec![f.base, f.overlay],
            Self::Rotate(r) => r.actors.clone(),
            Self::Reslice(_) => vec![
                SceneObject::Mesh,
                SceneObject::Volume,
                SceneObject::ClipPlane,
                SceneObject::SliceActor,
            ],
        }
    }

    /// Check parameters without touching a scene.
    pub fn validate(&self) -> MovieResult<()> {
        match self {
            Self::StillWait { .. } => Ok(()),
            Self::CrossFade(f) => f.validate(),
            Self::Rotate(r) => r.validate(),
            Self::Reslice(r) => r.validate(),
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(stage = self.name()))]
    pub(crate) fn run(&self, ctx: &mut StageCtx<'_>) -> MovieResult<Flow> {
        let first = ctx.frames();
        let flow = match self {
            Self::StillWait { frames } => ctx.hold(*frames),
            Self::CrossFade(f) => f.run(ctx),
            Self::Rotate(r) => r.run(ctx),
            Self::Reslice(r) => r.run(ctx),
        }?;
        tracing::debug!(frames = ctx.frames() - first, ?flow, "stage returned");
        Ok(flow)
    }
}

/// Linear complementary fade: at value `v` the overlay has opacity `v`, the base `1 - v`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossFade {
    /// Actor fading opposite to the value. Default: volume.
    pub base: SceneObject,
    /// Actor whose opacity follows the value. Default: mesh.
    pub overlay: SceneObject,
    /// Starting value. Default: 0.
    pub from: f64,
    /// Final value, reached exactly on the last frame. Default: 1.
    pub to: f64,
    /// Value change per frame. Default: 0.02.
    pub step: f64,
}

impl Default for CrossFade {
    fn default() -> Self {
        Self {
            base: SceneObject::Volume,
            overlay: SceneObject::Mesh,
            from: 0.0,
            to: 1.0,
            step: 0.02,
        }
    }
}

impl CrossFade {
    fn validate(&self) -> MovieResult<()> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(MovieError::script("cross-fade step must be positive"));
        }
        if !(0.0..=1.0).contains(&self.from) || !(0.0..=1.0).contains(&self.to) {
            return Err(MovieError::script("cross-fade bounds must lie in [0, 1]"));
        }
        if self.base == self.overlay {
            return Err(MovieError::script("cross-fade base and overlay must differ"));
        }
        check_frame_budget("cross-fade", step_count(self.to - self.from, self.step))
    }

    /// Overlay value for each frame. The start value itself is not repeated.
    pub fn values(&self) -> Vec<f64> {
        let span = self.to - self.from;
        let steps = step_count(span, self.step).min(MAX_STAGE_FRAMES as f64) as u64;
        let dir = span.signum();
        (1..=steps)
            .map(|i| {
                if i == steps {
                    self.to
                } else {
                    self.from + dir * self.step * i as f64
                }
            })
            .collect()
    }

    fn run(&self, ctx: &mut StageCtx<'_>) -> MovieResult<Flow> {
        for v in self.values() {
            if ctx.cancelled() {
                return Ok(Flow::Cancelled);
            }
            ctx.scene(|s| {
                s.set_opacity(self.base, 1.0 - v)?;
                s.set_opacity(self.overlay, v)
            })?;
            if ctx.frame()? == Flow::Cancelled {
                return Ok(Flow::Cancelled);
            }
        }
        Ok(Flow::Continue)
    }
}

/// Rotation by a fixed increment per frame over an open sweep interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSweep {
    /// Actors rotated together. Default: volume and mesh.
    pub actors: Vec<SceneObject>,
    /// Rotation axis through the world origin. Default: `[0, 0, 1]`.
    pub axis: DVec3,
    /// Degrees per frame. Default: 0.25.
    pub increment_deg: f64,
    /// Total sweep in degrees. Default: 360.
    pub sweep_deg: f64,
    /// Orientation at the first frame, degrees. Default: 0.
    pub start_deg: f64,
}

impl Default for RotationSweep {
    fn default() -> Self {
        Self {
            actors: vec![SceneObject::Volume, SceneObject::Mesh],
            axis: DVec3::Z,
            increment_deg: 0.25,
            sweep_deg: 360.0,
            start_deg: 0.0,
        }
    }
}

impl RotationSweep {
    fn validate(&self) -> MovieResult<()> {
        if !(self.increment_deg.is_finite() && self.increment_deg > 0.0) {
            return Err(MovieError::script("rotation increment must be positive"));
        }
        if !(self.sweep_deg.is_finite() && self.sweep_deg > 0.0) {
            return Err(MovieError::script("rotation sweep must be positive"));
        }
        if self.actors.is_empty() {
            return Err(MovieError::script("rotation needs at least one actor"));
        }
        if let Some(bad) = self.actors.iter().find(|a| !a.is_actor()) {
            return Err(MovieError::script(format!("{bad} cannot be rotated")));
        }
        if self.axis.length_squared() <= f64::EPSILON || !self.axis.is_finite() {
            return Err(MovieError::script("rotation axis must be non-zero"));
        }
        check_frame_budget("rotation", step_count(self.sweep_deg, self.increment_deg))
    }

    /// Frames rendered: angles `start + k * increment` strictly below `start + sweep`.
    pub fn frame_count(&self) -> u64 {
        step_count(self.sweep_deg, self.increment_deg).min(MAX_STAGE_FRAMES as f64) as u64
    }

    /// Orientation of frame `k`.
    pub fn angle(&self, k: u64) -> f64 {
        self.start_deg + k as f64 * self.increment_deg
    }

    fn rotate_all(&self, s: &mut dyn SceneHandle, degrees: f64) -> MovieResult<()> {
        for &actor in &self.actors {
            s.set_rotation(actor, self.axis, degrees)?;
        }
        Ok(())
    }

    fn run(&self, ctx: &mut StageCtx<'_>) -> MovieResult<Flow> {
        for k in 0..self.frame_count() {
            if ctx.cancelled() {
                return Ok(Flow::Cancelled);
            }
            let angle = self.angle(k);
            ctx.scene(|s| self.rotate_all(s, angle))?;
            if ctx.frame()? == Flow::Cancelled {
                return Ok(Flow::Cancelled);
            }
        }
        let end = self.start_deg + self.sweep_deg;
        ctx.scene(|s| self.rotate_all(s, end))?;
        Ok(Flow::Continue)
    }
}

/// Cutting-plane sweep from the top of the mesh to its bottom, a pause, then back up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResliceSweep {
    /// Cutting axis. Default: `y`.
    pub axis: Axis,
    /// Plane positions per pass; the step is the mesh extent divided by this. Default: 400.
    pub steps: u32,
    /// Frames held at the bottom of the sweep. Default: 20.
    pub pause_frames: u32,
    /// Weight of the secondary volume in the blended cross-section. Default: 0.5.
    pub overlay_weight: f64,
}

impl Default for ResliceSweep {
    fn default() -> Self {
        Self {
            axis: Axis::Y,
            steps: 400,
            pause_frames: 20,
            overlay_weight: 0.5,
        }
    }
}

impl ResliceSweep {
    fn validate(&self) -> MovieResult<()> {
        if self.steps == 0 {
            return Err(MovieError::script("reslice needs at least one step"));
        }
        // Forward and return passes each visit up to `steps + 1` positions.
        check_frame_budget("reslice", 2.0 * (f64::from(self.steps) + 1.0))?;
        if !(0.0..=1.0).contains(&self.overlay_weight) {
            return Err(MovieError::script("reslice overlay weight must lie in [0, 1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/script/stage.rs"]
mod tests;
