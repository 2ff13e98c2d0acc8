use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::settings::{CameraPose, RenderQuality};
use crate::foundation::core::{Axis, Bounds3, DVec3, Size};
use crate::foundation::error::{MovieError, MovieResult};
use crate::resources::mesh::Mesh;
use crate::resources::volume::{SliceImage, Volume};

/// A rendered frame as straight-alpha RGBA8 pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// Wrap raw pixels, checking the buffer length.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> MovieResult<Self> {
        let expected = Size::new(width, height).rgba_len();
        if data.len() != expected {
            return Err(MovieError::encode(format!(
                "frame buffer is {} bytes, {width}x{height} needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with one color.
    pub fn solid(size: Size, rgba: [u8; 4]) -> Self {
        Self {
            width: size.width,
            height: size.height,
            data: rgba.repeat((size.width as usize) * (size.height as usize)),
        }
    }

    /// Pixel size.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Borrow as an `image` buffer.
    pub fn to_image(&self) -> MovieResult<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            MovieError::encode(format!(
                "frame buffer does not match {}x{}",
                self.width, self.height
            ))
        })
    }

    /// Take ownership of an `image` buffer.
    pub fn from_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }
}

/// Scene objects a script can refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneObject {
    /// The merged surface mesh actor.
    Mesh,
    /// The primary volume actor.
    Volume,
    /// The clip plane applied to the mesh.
    ClipPlane,
    /// The textured cross-section actor.
    SliceActor,
    /// The secondary volume actor.
    Overlay,
}

impl SceneObject {
    /// Objects whose opacity and transform can be animated.
    pub fn is_actor(self) -> bool {
        matches!(self, Self::Mesh | Self::Volume | Self::SliceActor | Self::Overlay)
    }
}

impl std::fmt::Display for SceneObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Mesh => "mesh",
            Self::Volume => "volume",
            Self::ClipPlane => "clip_plane",
            Self::SliceActor => "slice_actor",
            Self::Overlay => "overlay",
        };
        f.write_str(s)
    }
}

/// Clip plane in mesh-local coordinates. Geometry on the side the normal points to is kept.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipPlane {
    /// A point on the plane.
    pub origin: DVec3,
    /// Plane normal.
    pub normal: DVec3,
}

impl ClipPlane {
    /// Signed distance from `p` to the plane along the normal.
    pub fn signed_distance(&self, p: DVec3) -> f64 {
        (p - self.origin).dot(self.normal)
    }
}

/// Contour polyline with per-point texture coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TexturedLoop {
    /// Points in mesh-local coordinates.
    pub points: Vec<DVec3>,
    /// `(u, v)` in `[0, 1]` for each point.
    pub tex_coords: Vec<[f64; 2]>,
    /// Whether the loop is closed.
    pub closed: bool,
}

/// New content for the slice actor at one reslice position.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceUpdate {
    /// Cutting axis.
    pub axis: Axis,
    /// Cut position in world coordinates.
    pub world_position: f64,
    /// Mesh cross-section outline.
    pub contour: Vec<TexturedLoop>,
    /// Volume cross-section.
    pub texture: SliceImage,
}

/// Capability to mutate and render the scene.
///
/// The controller owns the implementation. The script thread reaches it through a
/// [`SharedScene`], and only between a resume and its next capture request.
pub trait SceneHandle: Send {
    /// Whether `object` exists in this scene.
    fn contains(&self, object: SceneObject) -> bool;

    /// World-space bounds of an actor, `None` if absent.
    fn actor_bounds(&self, object: SceneObject) -> Option<Bounds3>;

    /// Source data of the mesh actor.
    fn mesh_data(&self) -> Option<Arc<Mesh>>;

    /// Source data of a volume actor ([`SceneObject::Volume`] or [`SceneObject::Overlay`]).
    fn volume_data(&self, object: SceneObject) -> Option<Arc<Volume>>;

    /// Set actor opacity in `[0, 1]`.
    fn set_opacity(&mut self, object: SceneObject, opacity: f64) -> MovieResult<()>;

    /// Set an actor's absolute rotation about `axis` through the world origin.
    fn set_rotation(&mut self, object: SceneObject, axis: DVec3, degrees: f64) -> MovieResult<()>;

    /// Move the mesh clip plane.
    fn set_clip_plane(&mut self, plane: ClipPlane) -> MovieResult<()>;

    /// Replace the slice actor's outline and texture.
    fn update_slice(&mut self, slice: SliceUpdate) -> MovieResult<()>;

    /// Apply renderer quality toggles and the axes overlay flag.
    fn apply_quality(&mut self, quality: &RenderQuality, axes_visible: bool) -> MovieResult<()>;

    /// Move the camera.
    fn set_camera(&mut self, pose: &CameraPose) -> MovieResult<()>;

    /// Current camera pose.
    fn camera(&self) -> CameraPose;

    /// Base viewport size.
    fn viewport(&self) -> Size;

    /// Render the current state at `viewport * magnification` and read the pixels back.
    fn render(&mut self, magnification: u32) -> MovieResult<FrameRGBA>;
}

/// Scene shared between the controller and the script thread.
pub type SharedScene = Arc<Mutex<dyn SceneHandle>>;

/// Wrap a scene for sharing.
pub fn share(scene: impl SceneHandle + 'static) -> SharedScene {
    Arc::new(Mutex::new(scene))
}

/// Run `f` with the scene locked.
pub fn with_scene<R>(
    scene: &SharedScene,
    f: impl FnOnce(&mut dyn SceneHandle) -> MovieResult<R>,
) -> MovieResult<R> {
    let mut guard = scene
        .lock()
        .map_err(|_| MovieError::script("scene lock poisoned"))?;
    f(&mut *guard)
}

#[cfg(test)]
#[path = "../../tests/unit/scene/handle.rs"]
mod tests;
