use std::collections::HashMap;
use std::path::Path;

use crate::foundation::core::{Axis, Bounds3, DVec3};
use crate::foundation::error::{MovieError, MovieResult};

/// Triangle mesh in its own (local) coordinate frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions.
    pub positions: Vec<DVec3>,
    /// Triangles as indices into `positions`.
    pub triangles: Vec<[u32; 3]>,
}

/// Cut edge key. Two triangles sharing an edge produce the same key for its crossing point.
type EdgeKey = (u32, u32);

/// Polylines where a plane cuts a mesh, in mesh-local coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Contour {
    /// Connected polylines.
    pub loops: Vec<ContourLoop>,
}

/// One connected polyline of a [`Contour`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContourLoop {
    /// Points in traversal order. A closed loop does not repeat its first point.
    pub points: Vec<DVec3>,
    /// Whether the last point connects back to the first.
    pub closed: bool,
}

impl Contour {
    /// Total number of points over all loops.
    pub fn point_count(&self) -> usize {
        self.loops.iter().map(|l| l.points.len()).sum()
    }

    /// Return `true` when the plane missed the mesh.
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }
}

impl Mesh {
    /// Create a mesh, checking that every triangle index is in range.
    pub fn new(positions: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> MovieResult<Self> {
        let n = positions.len();
        if let Some(bad) = triangles
            .iter()
            .flatten()
            .find(|&&i| i as usize >= n)
        {
            return Err(MovieError::resource(format!(
                "triangle index {bad} out of range for {n} vertices"
            )));
        }
        Ok(Self {
            positions,
            triangles,
        })
    }

    /// Read a Wavefront OBJ file, triangulating polygons and merging all objects in it.
    #[tracing::instrument]
    pub fn load_obj(path: &Path) -> MovieResult<Self> {
        if !path.exists() {
            return Err(MovieError::resource(format!(
                "can't find {}",
                path.display()
            )));
        }
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .map_err(|e| MovieError::resource(format!("read mesh '{}': {e}", path.display())))?;

        let mut mesh = Mesh::default();
        for model in models {
            let m = model.mesh;
            let offset = mesh.positions.len() as u32;
            mesh.positions.extend(m.positions.chunks_exact(3).map(|p| {
                DVec3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2]))
            }));
            mesh.triangles.extend(
                m.indices
                    .chunks_exact(3)
                    .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
            );
        }

        if mesh.triangles.is_empty() {
            return Err(MovieError::resource(format!(
                "mesh '{}' has no triangles",
                path.display()
            )));
        }
        tracing::debug!(
            vertices = mesh.positions.len(),
            triangles = mesh.triangles.len(),
            "mesh loaded"
        );
        Ok(mesh)
    }

    /// Append another mesh, re-indexing its triangles.
    pub fn append(&mut self, other: &Mesh) {
        let offset = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.triangles.extend(
            other
                .triangles
                .iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
    }

    /// Bounds of the vertex positions, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Bounds3> {
        Bounds3::from_points(&self.positions)
    }

    /// Cut the mesh with the plane `axis == coord` and chain the crossings into polylines.
    ///
    /// Vertices lying exactly on the plane count as being above it, so every triangle
    /// contributes either zero or one segment.
    pub fn contour(&self, axis: Axis, coord: f64) -> Contour {
        let dist = |i: u32| axis.of(self.positions[i as usize]) - coord;

        let mut points = HashMap::<EdgeKey, DVec3>::new();
        let mut segments = Vec::<(EdgeKey, EdgeKey)>::new();

        for tri in &self.triangles {
            let mut hits = [None::<EdgeKey>; 2];
            let mut n = 0;
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let (a, b) = if a <= b { (a, b) } else { (b, a) };
                let (da, db) = (dist(a), dist(b));
                if (da >= 0.0) == (db >= 0.0) {
                    continue;
                }
                let key = (a, b);
                points.entry(key).or_insert_with(|| {
                    let pa = self.positions[a as usize];
                    let pb = self.positions[b as usize];
                    let t = da / (da - db);
                    axis.with(pa + (pb - pa) * t, coord)
                });
                if n < 2 {
                    hits[n] = Some(key);
                }
                n += 1;
            }
            if let [Some(a), Some(b)] = hits {
                segments.push((a, b));
            }
        }

        chain_segments(&segments, &points)
    }
}

fn chain_segments(segments: &[(EdgeKey, EdgeKey)], points: &HashMap<EdgeKey, DVec3>) -> Contour {
    let mut adjacency = HashMap::<EdgeKey, Vec<usize>>::new();
    for (i, &(a, b)) in segments.iter().enumerate() {
        adjacency.entry(a).or_default().push(i);
        adjacency.entry(b).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let mut next_from = |at: EdgeKey, used: &mut [bool]| -> Option<EdgeKey> {
        let seg = adjacency.get(&at)?.iter().copied().find(|&i| !used[i])?;
        used[seg] = true;
        let (a, b) = segments[seg];
        Some(if a == at { b } else { a })
    };

    let mut loops = Vec::new();
    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (first, second) = segments[start];
        let mut keys = std::collections::VecDeque::from([first, second]);

        let mut closed = false;
        while let Some(next) = next_from(keys[keys.len() - 1], &mut used) {
            if next == keys[0] {
                closed = true;
                break;
            }
            keys.push_back(next);
        }
        if !closed {
            while let Some(prev) = next_from(keys[0], &mut used) {
                keys.push_front(prev);
            }
        }

        loops.push(ContourLoop {
            points: keys.iter().filter_map(|k| points.get(k).copied()).collect(),
            closed,
        });
    }

    Contour { loops }
}

#[cfg(test)]
#[path = "../../tests/unit/resources/mesh.rs"]
mod tests;
