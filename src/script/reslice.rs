use std::sync::Arc;

use crate::foundation::core::{Axis, Bounds3, DVec3};
use crate::foundation::error::{MovieError, MovieResult};
use crate::foundation::math::unit_interval;
use crate::resources::mesh::{Contour, Mesh};
use crate::resources::volume::{SliceImage, Volume};
use crate::scene::handle::{ClipPlane, SceneHandle, SceneObject, SliceUpdate, TexturedLoop};
use crate::script::stage::{Flow, ResliceSweep, StageCtx};

/// Coordinate mapping for one reslice sweep, fixed when the stage starts.
///
/// The sweep runs in world coordinates between the top (`start`) and bottom (`end`) of the mesh
/// actor. Each world position maps to the mesh's and the volume's own data coordinates by the
/// offset between their actor bounds and data bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepFrame {
    /// Cutting axis.
    pub axis: Axis,
    /// Bounds of the mesh data.
    pub mesh_local: Bounds3,
    /// Bounds of the mesh actor in the world.
    pub mesh_world: Bounds3,
    /// Bounds of the volume data.
    pub volume_local: Bounds3,
    /// Bounds of the volume actor in the world.
    pub volume_world: Bounds3,
    /// Distance between successive plane positions.
    pub step: f64,
}

impl SweepFrame {
    /// Build a frame, with the step being the mesh data extent along `axis` over `steps`.
    pub fn new(
        axis: Axis,
        mesh_local: Bounds3,
        mesh_world: Bounds3,
        volume_local: Bounds3,
        volume_world: Bounds3,
        steps: u32,
    ) -> MovieResult<Self> {
        if steps == 0 {
            return Err(MovieError::script("reslice needs at least one step"));
        }
        let extent = mesh_local.extent(axis);
        if !(extent.is_finite() && extent > 0.0) {
            return Err(MovieError::script(format!(
                "mesh is flat along {axis:?}, nothing to sweep"
            )));
        }
        Ok(Self {
            axis,
            mesh_local,
            mesh_world,
            volume_local,
            volume_world,
            step: extent / f64::from(steps),
        })
    }

    /// Read actor and data bounds from the scene.
    pub fn from_scene(scene: &dyn SceneHandle, axis: Axis, steps: u32) -> MovieResult<Self> {
        let missing = |what: &str| MovieError::script(format!("reslice: scene has no {what}"));
        let mesh_local = scene
            .mesh_data()
            .and_then(|m| m.bounds())
            .ok_or_else(|| missing("mesh data"))?;
        let volume_local = scene
            .volume_data(SceneObject::Volume)
            .map(|v| v.bounds())
            .ok_or_else(|| missing("volume data"))?;
        let mesh_world = scene
            .actor_bounds(SceneObject::Mesh)
            .ok_or_else(|| missing("mesh actor"))?;
        let volume_world = scene
            .actor_bounds(SceneObject::Volume)
            .ok_or_else(|| missing("volume actor"))?;
        Self::new(axis, mesh_local, mesh_world, volume_local, volume_world, steps)
    }

    /// World position of the first cut.
    pub fn start(&self) -> f64 {
        self.mesh_world.hi(self.axis)
    }

    /// World position the forward pass stops at.
    pub fn end(&self) -> f64 {
        self.mesh_world.lo(self.axis)
    }

    /// World to mesh data coordinate.
    pub fn world_to_mesh(&self, world: f64) -> f64 {
        world - self.mesh_world.lo(self.axis) + self.mesh_local.lo(self.axis)
    }

    /// World to volume data coordinate.
    pub fn world_to_volume(&self, world: f64) -> f64 {
        world - self.volume_world.lo(self.axis) + self.volume_local.lo(self.axis)
    }

    /// `start, start - step, ...` down to the first position at or below `end`.
    ///
    /// A position within rounding noise of `end` is snapped onto it.
    pub fn forward_positions(&self) -> Vec<f64> {
        let (start, end) = (self.start(), self.end());
        let tolerance = self.step * 1e-9;
        let mut out = Vec::new();
        let mut k = 0u64;
        loop {
            let p = start - k as f64 * self.step;
            if p <= end + tolerance {
                out.push(p.min(end));
                return out;
            }
            out.push(p);
            k += 1;
        }
    }

    /// The forward positions in reverse, without the bottom one. Ends exactly at `start`.
    pub fn return_positions(&self) -> Vec<f64> {
        let mut forward = self.forward_positions();
        forward.pop();
        forward.reverse();
        forward
    }

    /// Texture coordinates of a mesh-local point, normalized by the mesh data bounds.
    pub fn tex_coord(&self, p: DVec3) -> [f64; 2] {
        let (u, v) = self.axis.plane_axes();
        [
            unit_interval(u.of(p), self.mesh_local.lo(u), self.mesh_local.hi(u)),
            unit_interval(v.of(p), self.mesh_local.lo(v), self.mesh_local.hi(v)),
        ]
    }

    /// Attach texture coordinates to a contour.
    pub fn texture_contour(&self, contour: Contour) -> Vec<TexturedLoop> {
        contour
            .loops
            .into_iter()
            .map(|l| TexturedLoop {
                tex_coords: l.points.iter().map(|&p| self.tex_coord(p)).collect(),
                points: l.points,
                closed: l.closed,
            })
            .collect()
    }
}

/// Data sampled at every sweep step.
struct SweepInputs {
    mesh: Arc<Mesh>,
    volume: Arc<Volume>,
    overlay: Option<Arc<Volume>>,
}

impl SweepInputs {
    fn from_scene(scene: &dyn SceneHandle) -> MovieResult<Self> {
        Ok(Self {
            mesh: scene
                .mesh_data()
                .ok_or_else(|| MovieError::script("reslice: scene has no mesh data"))?,
            volume: scene
                .volume_data(SceneObject::Volume)
                .ok_or_else(|| MovieError::script("reslice: scene has no volume data"))?,
            overlay: scene.volume_data(SceneObject::Overlay),
        })
    }

    fn cross_section(&self, axis: Axis, coord: f64, overlay_weight: f64) -> SliceImage {
        let primary = self.volume.reslice(axis, coord);
        match &self.overlay {
            Some(overlay) => primary.blend(&overlay.reslice(axis, coord), overlay_weight),
            None => primary,
        }
    }
}

impl ResliceSweep {
    fn step_update(
        &self,
        frame: &SweepFrame,
        inputs: &SweepInputs,
        world: f64,
    ) -> (ClipPlane, SliceUpdate) {
        let mesh_coord = frame.world_to_mesh(world);
        let clip = ClipPlane {
            origin: self.axis.with(DVec3::ZERO, mesh_coord),
            normal: -self.axis.unit(),
        };
        let texture =
            inputs.cross_section(self.axis, frame.world_to_volume(world), self.overlay_weight);
        let contour = frame.texture_contour(inputs.mesh.contour(self.axis, mesh_coord));
        let update = SliceUpdate {
            axis: self.axis,
            world_position: world,
            contour,
            texture,
        };
        (clip, update)
    }

    fn pass(
        &self,
        ctx: &mut StageCtx<'_>,
        frame: &SweepFrame,
        inputs: &SweepInputs,
        positions: &[f64],
    ) -> MovieResult<Flow> {
        for &world in positions {
            if ctx.cancelled() {
                return Ok(Flow::Cancelled);
            }
            let (clip, update) = self.step_update(frame, inputs, world);
            ctx.scene(|s| {
                s.set_clip_plane(clip)?;
                s.update_slice(update)
            })?;
            if ctx.frame()? == Flow::Cancelled {
                return Ok(Flow::Cancelled);
            }
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn run(&self, ctx: &mut StageCtx<'_>) -> MovieResult<Flow> {
        let (frame, inputs) = ctx.scene(|s| {
            let frame = SweepFrame::from_scene(&*s, self.axis, self.steps)?;
            Ok((frame, SweepInputs::from_scene(&*s)?))
        })?;
        let forward = frame.forward_positions();
        tracing::debug!(
            start = frame.start(),
            end = frame.end(),
            step = frame.step,
            positions = forward.len(),
            blended = inputs.overlay.is_some(),
            "reslice sweep"
        );

        if self.pass(ctx, &frame, &inputs, &forward)? == Flow::Cancelled
            || ctx.hold(self.pause_frames)? == Flow::Cancelled
        {
            return Ok(Flow::Cancelled);
        }
        self.pass(ctx, &frame, &inputs, &frame.return_positions())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/script/reslice.rs"]
mod tests;
