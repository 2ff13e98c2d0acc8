use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::settings::{CameraPose, RenderQuality};
use crate::foundation::core::{Bounds3, DVec3, Size};
use crate::foundation::error::{MovieError, MovieResult};
use crate::resources::mesh::Mesh;
use crate::resources::volume::Volume;
use crate::scene::handle::{ClipPlane, FrameRGBA, SceneHandle, SceneObject, SliceUpdate};

/// One observed call on a [`RecordingScene`].
#[derive(Clone, Debug, PartialEq)]
pub enum SceneEvent {
    /// `set_opacity`.
    Opacity(SceneObject, f64),
    /// `set_rotation`, degrees.
    Rotation(SceneObject, f64),
    /// `set_clip_plane`.
    Clip(ClipPlane),
    /// `update_slice`, world position and contour loop count.
    Slice {
        /// Cut position in world coordinates.
        world_position: f64,
        /// Number of contour loops.
        loops: usize,
    },
    /// `render` at the given magnification.
    Render(u32),
}

/// Scene double that records every mutation and renders flat frames.
///
/// Rendered frames are filled with a color derived from the render count so tests can tell
/// frames apart.
#[derive(Debug)]
pub struct RecordingScene {
    objects: BTreeSet<SceneObject>,
    offsets: BTreeMap<SceneObject, DVec3>,
    mesh: Option<Arc<Mesh>>,
    volume: Option<Arc<Volume>>,
    overlay: Option<Arc<Volume>>,
    viewport: Size,
    camera: CameraPose,
    quality: Option<(RenderQuality, bool)>,
    events: Vec<SceneEvent>,
    renders: u64,
}

impl RecordingScene {
    /// A scene with no objects.
    pub fn empty(viewport: Size) -> Self {
        Self {
            objects: BTreeSet::new(),
            offsets: BTreeMap::new(),
            mesh: None,
            volume: None,
            overlay: None,
            viewport,
            camera: CameraPose::default(),
            quality: None,
            events: Vec::new(),
            renders: 0,
        }
    }

    /// A scene holding `mesh` and `volume`, plus the clip plane and slice actor.
    pub fn with_data(viewport: Size, mesh: Mesh, volume: Volume) -> Self {
        let mut scene = Self::empty(viewport);
        scene.mesh = Some(Arc::new(mesh));
        scene.volume = Some(Arc::new(volume));
        scene.objects.extend([
            SceneObject::Mesh,
            SceneObject::Volume,
            SceneObject::ClipPlane,
            SceneObject::SliceActor,
        ]);
        scene
    }

    /// Add the secondary volume.
    pub fn with_overlay(mut self, volume: Volume) -> Self {
        self.overlay = Some(Arc::new(volume));
        self.objects.insert(SceneObject::Overlay);
        self
    }

    /// Place an actor at a world offset from its data coordinates.
    pub fn with_offset(mut self, object: SceneObject, offset: DVec3) -> Self {
        self.offsets.insert(object, offset);
        self
    }

    /// Remove an object, to exercise validation.
    pub fn without(mut self, object: SceneObject) -> Self {
        self.objects.remove(&object);
        self
    }

    /// Every call observed so far.
    pub fn events(&self) -> &[SceneEvent] {
        &self.events
    }

    /// Number of `render` calls.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Last quality settings applied.
    pub fn quality(&self) -> Option<(RenderQuality, bool)> {
        self.quality
    }

    fn require(&self, object: SceneObject) -> MovieResult<()> {
        if self.objects.contains(&object) {
            Ok(())
        } else {
            Err(MovieError::script(format!("scene has no {object}")))
        }
    }

    fn data_bounds(&self, object: SceneObject) -> Option<Bounds3> {
        match object {
            SceneObject::Mesh | SceneObject::ClipPlane => self.mesh.as_ref()?.bounds(),
            SceneObject::Volume | SceneObject::SliceActor => Some(self.volume.as_ref()?.bounds()),
            SceneObject::Overlay => Some(self.overlay.as_ref()?.bounds()),
        }
    }
}

impl SceneHandle for RecordingScene {
    fn contains(&self, object: SceneObject) -> bool {
        self.objects.contains(&object)
    }

    fn actor_bounds(&self, object: SceneObject) -> Option<Bounds3> {
        if !self.contains(object) {
            return None;
        }
        let offset = self.offsets.get(&object).copied().unwrap_or(DVec3::ZERO);
        self.data_bounds(object).map(|b| b.translated(offset))
    }

    fn mesh_data(&self) -> Option<Arc<Mesh>> {
        self.mesh.clone()
    }

    fn volume_data(&self, object: SceneObject) -> Option<Arc<Volume>> {
        match object {
            SceneObject::Volume => self.volume.clone(),
            SceneObject::Overlay => self.overlay.clone(),
            _ => None,
        }
    }

    fn set_opacity(&mut self, object: SceneObject, opacity: f64) -> MovieResult<()> {
        self.require(object)?;
        self.events.push(SceneEvent::Opacity(object, opacity));
        Ok(())
    }

    fn set_rotation(&mut self, object: SceneObject, _axis: DVec3, degrees: f64) -> MovieResult<()> {
        self.require(object)?;
        self.events.push(SceneEvent::Rotation(object, degrees));
        Ok(())
    }

    fn set_clip_plane(&mut self, plane: ClipPlane) -> MovieResult<()> {
        self.require(SceneObject::ClipPlane)?;
        self.events.push(SceneEvent::Clip(plane));
        Ok(())
    }

    fn update_slice(&mut self, slice: SliceUpdate) -> MovieResult<()> {
        self.require(SceneObject::SliceActor)?;
        self.events.push(SceneEvent::Slice {
            world_position: slice.world_position,
            loops: slice.contour.len(),
        });
        Ok(())
    }

    fn apply_quality(&mut self, quality: &RenderQuality, axes_visible: bool) -> MovieResult<()> {
        self.quality = Some((*quality, axes_visible));
        Ok(())
    }

    fn set_camera(&mut self, pose: &CameraPose) -> MovieResult<()> {
        pose.validate()?;
        self.camera = *pose;
        Ok(())
    }

    fn camera(&self) -> CameraPose {
        self.camera
    }

    fn viewport(&self) -> Size {
        self.viewport
    }

    fn render(&mut self, magnification: u32) -> MovieResult<FrameRGBA> {
        self.renders += 1;
        self.events.push(SceneEvent::Render(magnification));
        let shade = (self.renders % 256) as u8;
        Ok(FrameRGBA::solid(
            self.viewport.magnified(magnification.max(1)),
            [shade, 255 - shade, 0, 255],
        ))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/recording.rs"]
mod tests;
