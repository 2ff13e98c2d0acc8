use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use glam::{DMat4, DQuat};
use image::{Rgba, RgbaImage};

use crate::config::settings::{CameraPose, RenderQuality};
use crate::foundation::core::{Bounds3, DVec3, Size};
use crate::foundation::error::{MovieError, MovieResult};
use crate::foundation::math::{blend_u8, mul_div255_u8, opacity_to_u8};
use crate::resources::loader::ResourceSet;
use crate::resources::mesh::Mesh;
use crate::resources::volume::Volume;
use crate::scene::handle::{ClipPlane, FrameRGBA, SceneHandle, SceneObject, SliceUpdate};

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];
const MESH_RGB: [u8; 3] = [222, 184, 160];
const MAX_VOLUME_POINTS: usize = 60_000;
const VOLUME_THRESHOLD: u8 = 32;
const LOGO_MARGIN: u32 = 8;
const MAX_SUPERSAMPLE: u32 = 4;

#[derive(Clone, Copy, Debug)]
struct ActorState {
    offset: DVec3,
    opacity: f64,
    rotation: DQuat,
}

impl ActorState {
    fn to_world(&self, local: DVec3) -> DVec3 {
        self.rotation * (local + self.offset)
    }
}

/// CPU preview scene.
///
/// Draws the volume as a sparse intensity point cloud, the mesh as clipped vertex splats and the
/// slice contour as textured polylines, with logos composited in the lower right corner. Both
/// data sets are centered on the world origin so rotations spin them in place.
///
/// Quality toggles map onto the preview as follows:
/// - point, polygon and line smoothing add a half-alpha fringe to volume splats, mesh splats and
///   contour lines respectively;
/// - anti-aliasing supersamples by `ceil(sqrt(samples))` and downsamples with Lanczos3;
/// - motion blur averages each frame with the previous frames rendered at the same size.
///
/// Shadows have nothing to fall on in a point preview and are ignored.
#[derive(Debug)]
pub struct SoftwareScene {
    viewport: Size,
    camera: CameraPose,
    quality: RenderQuality,
    axes_visible: bool,
    mesh: Arc<Mesh>,
    volume: Arc<Volume>,
    overlay: Option<Arc<Volume>>,
    volume_points: Vec<(DVec3, u8)>,
    actors: BTreeMap<SceneObject, ActorState>,
    clip: Option<ClipPlane>,
    slice: Option<SliceUpdate>,
    logos: Vec<RgbaImage>,
    blur_history: BTreeMap<(u32, u32), VecDeque<RgbaImage>>,
}

impl SoftwareScene {
    /// Build the scene from loaded resources.
    ///
    /// The volume starts opaque and the mesh hidden; scripts fade between them.
    pub fn new(resources: ResourceSet, viewport: Size) -> MovieResult<Self> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(MovieError::validation("viewport must be non-empty"));
        }
        let mesh_bounds = resources
            .mesh
            .bounds()
            .ok_or_else(|| MovieError::resource("mesh has no vertices"))?;
        let volume_bounds = resources.volume.bounds();

        let actor = |bounds: Bounds3, opacity: f64| ActorState {
            offset: -bounds.center(),
            opacity,
            rotation: DQuat::IDENTITY,
        };
        let mut actors = BTreeMap::new();
        actors.insert(SceneObject::Mesh, actor(mesh_bounds, 0.0));
        actors.insert(SceneObject::Volume, actor(volume_bounds, 1.0));
        actors.insert(SceneObject::SliceActor, actor(mesh_bounds, 1.0));
        if let Some(overlay) = &resources.overlay_volume {
            actors.insert(SceneObject::Overlay, actor(overlay.bounds(), 0.0));
        }

        let volume_points = sample_volume(&resources.volume);
        tracing::debug!(points = volume_points.len(), "volume point cloud built");

        Ok(Self {
            viewport,
            camera: CameraPose::default(),
            quality: RenderQuality::default(),
            axes_visible: false,
            mesh: Arc::new(resources.mesh),
            volume: Arc::new(resources.volume),
            overlay: resources.overlay_volume.map(Arc::new),
            volume_points,
            actors,
            clip: None,
            slice: None,
            logos: resources.logos,
            blur_history: BTreeMap::new(),
        })
    }

    fn actor_mut(&mut self, object: SceneObject) -> MovieResult<&mut ActorState> {
        self.actors
            .get_mut(&object)
            .ok_or_else(|| MovieError::script(format!("scene has no animatable {object}")))
    }

    fn data_bounds(&self, object: SceneObject) -> Option<Bounds3> {
        match object {
            SceneObject::Mesh | SceneObject::SliceActor | SceneObject::ClipPlane => {
                self.mesh.bounds()
            }
            SceneObject::Volume => Some(self.volume.bounds()),
            SceneObject::Overlay => self.overlay.as_ref().map(|v| v.bounds()),
        }
    }

    fn scene_radius(&self) -> f64 {
        self.actors
            .iter()
            .filter_map(|(obj, a)| self.data_bounds(*obj).map(|b| b.translated(a.offset)))
            .flat_map(|b| b.corners())
            .map(|c| c.length())
            .fold(1e-6, f64::max)
    }
}

fn sample_volume(volume: &Volume) -> Vec<(DVec3, u8)> {
    let [nx, ny, nz] = volume.dims();
    let total = nx * ny * nz;
    let mut stride = 1usize;
    while total / (stride * stride * stride) > MAX_VOLUME_POINTS {
        stride += 1;
    }
    let origin = volume.bounds().min;
    let spacing = volume.spacing();
    let mut points = Vec::new();
    for z in (0..nz).step_by(stride) {
        for y in (0..ny).step_by(stride) {
            for x in (0..nx).step_by(stride) {
                let v = volume.voxel(x, y, z);
                if v >= VOLUME_THRESHOLD {
                    let p = origin + DVec3::new(x as f64, y as f64, z as f64) * spacing;
                    points.push((p, v));
                }
            }
        }
    }
    points
}

struct View {
    view: DMat4,
    half_w: f64,
    half_h: f64,
    width: f64,
    height: f64,
}

impl View {
    fn new(camera: &CameraPose, size: Size, radius: f64) -> Self {
        let dir = (camera.focal_point - camera.position).try_normalize().unwrap_or(DVec3::NEG_Z);
        let base_up = if dir.cross(DVec3::Y).length_squared() < 1e-12 {
            DVec3::Z
        } else {
            DVec3::Y
        };
        let up = DQuat::from_axis_angle(dir, camera.roll.to_radians()) * base_up;
        let (width, height) = (f64::from(size.width), f64::from(size.height));
        let half_h = radius / camera.zoom.max(1e-6);
        Self {
            view: DMat4::look_at_rh(camera.position, camera.focal_point, up),
            half_w: half_h * width / height,
            half_h,
            width,
            height,
        }
    }

    fn project(&self, p: DVec3) -> (f64, f64) {
        let v = self.view.transform_point3(p);
        let x = (v.x / self.half_w * 0.5 + 0.5) * self.width;
        let y = (0.5 - v.y / self.half_h * 0.5) * self.height;
        (x, y)
    }
}

/// Splat size, with an optional fringe one pixel wider at half alpha.
#[derive(Clone, Copy, Debug)]
struct Brush {
    radius: u32,
    smooth: bool,
}

impl Brush {
    fn dot(self, img: &mut RgbaImage, at: (f64, f64), rgb: [u8; 3], alpha: u8) {
        if self.smooth {
            splat(img, at, self.radius + 1, rgb, alpha / 2);
        }
        splat(img, at, self.radius, rgb, alpha);
    }

    fn line(self, img: &mut RgbaImage, a: (f64, f64), b: (f64, f64), rgb: [u8; 3], alpha: u8) {
        if self.smooth {
            line(img, a, b, self.radius + 1, rgb, alpha / 2);
        }
        line(img, a, b, self.radius, rgb, alpha);
    }
}

/// Supersampling factor for `samples` anti-alias samples.
fn supersample_factor(samples: u32) -> u32 {
    if samples <= 1 {
        1
    } else {
        (f64::from(samples).sqrt().ceil() as u32).min(MAX_SUPERSAMPLE)
    }
}

/// Per-channel mean of equally sized frames.
fn average(frames: &VecDeque<RgbaImage>) -> Option<RgbaImage> {
    let first = frames.front()?;
    let n = frames.len() as u32;
    let mut sums = vec![0u32; first.as_raw().len()];
    for frame in frames {
        for (sum, &b) in sums.iter_mut().zip(frame.as_raw()) {
            *sum += u32::from(b);
        }
    }
    let data = sums.into_iter().map(|s| ((s + n / 2) / n) as u8).collect();
    RgbaImage::from_raw(first.width(), first.height(), data)
}

fn splat(img: &mut RgbaImage, (x, y): (f64, f64), radius: u32, rgb: [u8; 3], alpha: u8) {
    if alpha == 0 || !x.is_finite() || !y.is_finite() {
        return;
    }
    let r = i64::from(radius);
    let (cx, cy) = (x.floor() as i64, y.floor() as i64);
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));
    for py in (cy - r + 1).max(0)..=(cy + r - 1).min(h - 1) {
        for px in (cx - r + 1).max(0)..=(cx + r - 1).min(w - 1) {
            let dst = img.get_pixel_mut(px as u32, py as u32);
            for c in 0..3 {
                dst.0[c] = blend_u8(dst.0[c], rgb[c], alpha);
            }
            dst.0[3] = 255;
        }
    }
}

fn line(img: &mut RgbaImage, a: (f64, f64), b: (f64, f64), radius: u32, rgb: [u8; 3], alpha: u8) {
    let steps = (b.0 - a.0).abs().max((b.1 - a.1).abs()).ceil().clamp(1.0, 16_384.0) as usize;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        splat(
            img,
            (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t),
            radius,
            rgb,
            alpha,
        );
    }
}

impl SceneHandle for SoftwareScene {
    fn contains(&self, object: SceneObject) -> bool {
        match object {
            SceneObject::ClipPlane => true,
            other => self.actors.contains_key(&other),
        }
    }

    fn actor_bounds(&self, object: SceneObject) -> Option<Bounds3> {
        let offset = match object {
            SceneObject::ClipPlane => self.actors.get(&SceneObject::Mesh)?.offset,
            other => self.actors.get(&other)?.offset,
        };
        self.data_bounds(object).map(|b| b.translated(offset))
    }

    fn mesh_data(&self) -> Option<Arc<Mesh>> {
        Some(self.mesh.clone())
    }

    fn volume_data(&self, object: SceneObject) -> Option<Arc<Volume>> {
        match object {
            SceneObject::Volume => Some(self.volume.clone()),
            SceneObject::Overlay => self.overlay.clone(),
            _ => None,
        }
    }

    fn set_opacity(&mut self, object: SceneObject, opacity: f64) -> MovieResult<()> {
        self.actor_mut(object)?.opacity = opacity.clamp(0.0, 1.0);
        Ok(())
    }

    fn set_rotation(&mut self, object: SceneObject, axis: DVec3, degrees: f64) -> MovieResult<()> {
        let axis = axis
            .try_normalize()
            .ok_or_else(|| MovieError::script("rotation axis must be non-zero"))?;
        self.actor_mut(object)?.rotation = DQuat::from_axis_angle(axis, degrees.to_radians());
        Ok(())
    }

    fn set_clip_plane(&mut self, plane: ClipPlane) -> MovieResult<()> {
        self.clip = Some(plane);
        Ok(())
    }

    fn update_slice(&mut self, slice: SliceUpdate) -> MovieResult<()> {
        self.slice = Some(slice);
        Ok(())
    }

    fn apply_quality(&mut self, quality: &RenderQuality, axes_visible: bool) -> MovieResult<()> {
        self.quality = *quality;
        self.blur_history.clear();
        self.axes_visible = axes_visible;
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
        let mag = magnification.max(1);
        let size = self.viewport.magnified(mag);
        let factor = supersample_factor(self.quality.anti_alias_samples());
        let mut img = self.draw(mag * factor);
        if factor > 1 {
            img = image::imageops::resize(
                &img,
                size.width,
                size.height,
                image::imageops::FilterType::Lanczos3,
            );
        }
        Ok(FrameRGBA::from_image(self.motion_blurred(img)))
    }
}

impl SoftwareScene {
    /// Mix `img` into the blur history for its size and return the blended frame.
    fn motion_blurred(&mut self, img: RgbaImage) -> RgbaImage {
        let frames = self.quality.motion_blur_frames() as usize;
        if frames <= 1 {
            self.blur_history.clear();
            return img;
        }
        let history = self.blur_history.entry(img.dimensions()).or_default();
        history.push_back(img);
        while history.len() > frames {
            history.pop_front();
        }
        match average(history) {
            Some(blended) => blended,
            None => history.back().cloned().unwrap_or_default(),
        }
    }

    fn draw(&self, mag: u32) -> RgbaImage {
        let size = self.viewport.magnified(mag);
        let mut img = RgbaImage::from_pixel(size.width, size.height, Rgba(BACKGROUND));
        let view = View::new(&self.camera, size, self.scene_radius());
        let brush = |smooth: bool| Brush {
            radius: mag,
            smooth,
        };
        let points = brush(self.quality.point_smoothing);
        let polygons = brush(self.quality.polygon_smoothing);
        let lines = brush(self.quality.line_smoothing);

        if let Some(vol) = self.actors.get(&SceneObject::Volume)
            && vol.opacity > 0.0
        {
            let a = opacity_to_u8(vol.opacity);
            for &(p, v) in &self.volume_points {
                let alpha = mul_div255_u8(u16::from(a), u16::from(v));
                points.dot(&mut img, view.project(vol.to_world(p)), [v, v, v], alpha);
            }
        }

        if let Some(mesh) = self.actors.get(&SceneObject::Mesh)
            && mesh.opacity > 0.0
        {
            let a = opacity_to_u8(mesh.opacity);
            for &p in &self.mesh.positions {
                if self.clip.is_some_and(|c| c.signed_distance(p) < 0.0) {
                    continue;
                }
                polygons.dot(&mut img, view.project(mesh.to_world(p)), MESH_RGB, a);
            }
        }

        if let (Some(slice), Some(actor)) = (&self.slice, self.actors.get(&SceneObject::SliceActor))
            && actor.opacity > 0.0
        {
            let a = opacity_to_u8(actor.opacity);
            for ring in &slice.contour {
                let pts: Vec<_> = ring
                    .points
                    .iter()
                    .map(|&p| view.project(actor.to_world(p)))
                    .collect();
                let colors: Vec<_> = ring
                    .tex_coords
                    .iter()
                    .map(|&[u, v]| {
                        let g = slice.texture.sample(u, v).max(VOLUME_THRESHOLD);
                        [g, g, g]
                    })
                    .collect();
                let n = pts.len().min(colors.len());
                let segments = if ring.closed { n } else { n.saturating_sub(1) };
                for i in 0..segments {
                    lines.line(&mut img, pts[i], pts[(i + 1) % n], colors[i], a);
                }
            }
        }

        if self.axes_visible {
            let origin = (f64::from(size.width) * 0.08, f64::from(size.height) * 0.9);
            let len = f64::from(size.height) * 0.06;
            let center = view.project(DVec3::ZERO);
            let axes = [
                (DVec3::X, [255, 0, 0]),
                (DVec3::Y, [0, 255, 0]),
                (DVec3::Z, [0, 0, 255]),
            ];
            for (axis, rgb) in axes {
                let tip = view.project(axis * view.half_h);
                let (dx, dy) = (tip.0 - center.0, tip.1 - center.1);
                let norm = (dx * dx + dy * dy).sqrt().max(1e-9);
                let end = (origin.0 + dx / norm * len, origin.1 + dy / norm * len);
                lines.line(&mut img, origin, end, rgb, 255);
            }
        }

        let mut right = size.width;
        for logo in &self.logos {
            let scaled;
            let logo = if mag > 1 {
                scaled = image::imageops::resize(
                    logo,
                    logo.width() * mag,
                    logo.height() * mag,
                    image::imageops::FilterType::Lanczos3,
                );
                &scaled
            } else {
                logo
            };
            let margin = LOGO_MARGIN * mag;
            let x = i64::from(right) - i64::from(logo.width()) - i64::from(margin);
            let y = i64::from(size.height) - i64::from(logo.height()) - i64::from(margin);
            image::imageops::overlay(&mut img, logo, x, y);
            right = right.saturating_sub(logo.width() + margin);
        }

        img
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/software.rs"]
mod tests;
