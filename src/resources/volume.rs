use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::core::{Axis, Bounds3, DVec3};
use crate::foundation::error::{MovieError, MovieResult};

/// 8-bit scalar volume on a regular grid.
///
/// Voxels are stored x-fastest, then y, then z. Physical position of voxel `(i, j, k)` is
/// `origin + (i, j, k) * spacing`.
#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    dims: [usize; 3],
    spacing: DVec3,
    origin: DVec3,
    voxels: Vec<u8>,
}

/// A 2D grayscale cross-section of a [`Volume`].
#[derive(Clone, Debug, PartialEq)]
pub struct SliceImage {
    /// Samples along the first in-plane axis.
    pub width: u32,
    /// Samples along the second in-plane axis.
    pub height: u32,
    /// Row-major intensities, `width * height` long.
    pub pixels: Vec<u8>,
}

impl Volume {
    /// Create a volume, checking the voxel count and spacing.
    pub fn new(dims: [usize; 3], spacing: DVec3, origin: DVec3, voxels: Vec<u8>) -> MovieResult<Self> {
        if dims.contains(&0) {
            return Err(MovieError::resource(format!("volume dims must be > 0, got {dims:?}")));
        }
        if !(spacing.is_finite() && spacing.min_element() > 0.0) {
            return Err(MovieError::resource(format!(
                "volume spacing must be positive, got {spacing}"
            )));
        }
        let expected = voxel_count(dims)
            .ok_or_else(|| MovieError::resource(format!("volume dims {dims:?} are too large")))?;
        if voxels.len() != expected {
            return Err(MovieError::resource(format!(
                "volume has {} voxels, dims {dims:?} need {expected}",
                voxels.len()
            )));
        }
        Ok(Self {
            dims,
            spacing,
            origin,
            voxels,
        })
    }

    /// Grid dimensions `[x, y, z]`.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Physical spacing between voxel centers.
    pub fn spacing(&self) -> DVec3 {
        self.spacing
    }

    /// Physical bounds spanned by the voxel centers.
    pub fn bounds(&self) -> Bounds3 {
        let extent = DVec3::new(
            (self.dims[0] - 1) as f64,
            (self.dims[1] - 1) as f64,
            (self.dims[2] - 1) as f64,
        );
        Bounds3 {
            min: self.origin,
            max: self.origin + extent * self.spacing,
        }
    }

    /// Intensity at integer grid coordinates.
    pub fn voxel(&self, x: usize, y: usize, z: usize) -> u8 {
        self.voxels[(z * self.dims[1] + y) * self.dims[0] + x]
    }

    fn voxel_at(&self, axis: Axis, slice: usize, u: usize, v: usize) -> u8 {
        let (ua, va) = axis.plane_axes();
        let mut ijk = [0usize; 3];
        ijk[axis.index()] = slice;
        ijk[ua.index()] = u;
        ijk[va.index()] = v;
        self.voxel(ijk[0], ijk[1], ijk[2])
    }

    /// Cross-section perpendicular to `axis` at physical coordinate `coord`.
    ///
    /// Coordinates outside the volume clamp to the nearest boundary slice. Between slices the
    /// two neighbours are linearly interpolated.
    pub fn reslice(&self, axis: Axis, coord: f64) -> SliceImage {
        let (ua, va) = axis.plane_axes();
        let (w, h) = (self.dims[ua.index()], self.dims[va.index()]);
        let last = (self.dims[axis.index()] - 1) as f64;

        let continuous = ((coord - axis.of(self.origin)) / axis.of(self.spacing)).clamp(0.0, last);
        let lo = continuous.floor() as usize;
        let hi = continuous.ceil() as usize;
        let t = continuous - lo as f64;

        let mut pixels = Vec::with_capacity(w * h);
        for v in 0..h {
            for u in 0..w {
                let a = f64::from(self.voxel_at(axis, lo, u, v));
                let b = f64::from(self.voxel_at(axis, hi, u, v));
                pixels.push((a + (b - a) * t).round() as u8);
            }
        }

        SliceImage {
            width: w as u32,
            height: h as u32,
            pixels,
        }
    }

    /// Read a MetaImage (`.mhd` header plus raw data file).
    ///
    /// Supports uncompressed 3D `MET_UCHAR` and `MET_USHORT` data. 16-bit data is rescaled to
    /// 8 bits by its maximum.
    #[tracing::instrument]
    pub fn load_mhd(path: &Path) -> MovieResult<Self> {
        if !path.exists() {
            return Err(MovieError::resource(format!("can't find {}", path.display())));
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read volume header '{}'", path.display()))?;
        let header = MetaHeader::parse(&text)
            .map_err(|e| MovieError::resource(format!("volume header '{}': {e}", path.display())))?;

        let data_path = match header.data_file.as_str() {
            "LOCAL" => {
                return Err(MovieError::resource(format!(
                    "volume '{}': inline (LOCAL) data is not supported",
                    path.display()
                )));
            }
            name => path.parent().unwrap_or(Path::new(".")).join(name),
        };
        if !data_path.exists() {
            return Err(MovieError::resource(format!("can't find {}", data_path.display())));
        }
        let raw = std::fs::read(&data_path)
            .with_context(|| format!("read volume data '{}'", data_path.display()))?;

        let voxels = header.decode(&raw).map_err(|e| {
            MovieError::resource(format!("volume data '{}': {e}", data_path.display()))
        })?;
        let volume = Self::new(header.dims, header.spacing, header.origin, voxels)?;
        tracing::debug!(dims = ?volume.dims, spacing = %volume.spacing, "volume loaded");
        Ok(volume)
    }
}

impl SliceImage {
    /// Intensity at `(u, v)`.
    pub fn get(&self, u: u32, v: u32) -> u8 {
        self.pixels[(v * self.width + u) as usize]
    }

    /// Nearest-neighbour sample at normalized coordinates in `[0, 1]`.
    pub fn sample(&self, u: f64, v: f64) -> u8 {
        let x = (u.clamp(0.0, 1.0) * f64::from(self.width - 1)).round() as u32;
        let y = (v.clamp(0.0, 1.0) * f64::from(self.height - 1)).round() as u32;
        self.get(x, y)
    }

    /// Weighted mix of two cross-sections: `self * (1 - weight) + other * weight`.
    ///
    /// `other` is resampled onto this image's grid when the sizes differ.
    pub fn blend(&self, other: &SliceImage, weight: f64) -> SliceImage {
        let w = weight.clamp(0.0, 1.0);
        let same = self.width == other.width && self.height == other.height;
        let mut pixels = Vec::with_capacity(self.pixels.len());
        for y in 0..self.height {
            for x in 0..self.width {
                let a = f64::from(self.get(x, y));
                let b = if same {
                    other.get(x, y)
                } else {
                    other.sample(norm(x, self.width), norm(y, self.height))
                };
                pixels.push((a * (1.0 - w) + f64::from(b) * w).round() as u8);
            }
        }
        SliceImage {
            width: self.width,
            height: self.height,
            pixels,
        }
    }

    /// Colorize through a grayscale lookup table. Zero intensity maps to fully transparent.
    pub fn to_rgba(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            let g = self.get(x, y);
            image::Rgba([g, g, g, if g == 0 { 0 } else { 255 }])
        })
    }
}

fn voxel_count(dims: [usize; 3]) -> Option<usize> {
    dims[0].checked_mul(dims[1])?.checked_mul(dims[2])
}

fn norm(i: u32, n: u32) -> f64 {
    if n <= 1 {
        0.0
    } else {
        f64::from(i) / f64::from(n - 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ElementType {
    UChar,
    UShort,
}

#[derive(Debug)]
struct MetaHeader {
    dims: [usize; 3],
    spacing: DVec3,
    origin: DVec3,
    element: ElementType,
    big_endian: bool,
    data_file: String,
}

impl MetaHeader {
    fn parse(text: &str) -> Result<Self, String> {
        let fields: HashMap<&str, &str> = text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let ndims = fields.get("NDims").copied().unwrap_or("3");
        if ndims != "3" {
            return Err(format!("expected NDims = 3, got {ndims}"));
        }
        if fields
            .get("CompressedData")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Err("compressed data is not supported".to_owned());
        }

        let dims_v = numbers::<usize>(fields.get("DimSize").ok_or("missing DimSize")?)?;
        let dims: [usize; 3] = dims_v
            .try_into()
            .map_err(|v: Vec<usize>| format!("DimSize needs 3 values, got {}", v.len()))?;

        let vec3 = |key: &str, default: DVec3| -> Result<DVec3, String> {
            match fields.get(key) {
                None => Ok(default),
                Some(v) => match numbers::<f64>(v)?.as_slice() {
                    [x, y, z] => Ok(DVec3::new(*x, *y, *z)),
                    other => Err(format!("{key} needs 3 values, got {}", other.len())),
                },
            }
        };
        let spacing = vec3("ElementSpacing", DVec3::ONE)?;
        let origin = match fields.get("Offset") {
            Some(_) => vec3("Offset", DVec3::ZERO)?,
            None => vec3("Origin", DVec3::ZERO)?,
        };

        let element = match fields.get("ElementType").copied() {
            Some("MET_UCHAR") => ElementType::UChar,
            Some("MET_USHORT") => ElementType::UShort,
            Some(other) => return Err(format!("unsupported ElementType {other}")),
            None => return Err("missing ElementType".to_owned()),
        };
        let big_endian = ["BinaryDataByteOrderMSB", "ElementByteOrderMSB"]
            .iter()
            .filter_map(|k| fields.get(k))
            .any(|v| v.eq_ignore_ascii_case("true"));
        let data_file = fields
            .get("ElementDataFile")
            .ok_or("missing ElementDataFile")?
            .to_string();

        Ok(Self {
            dims,
            spacing,
            origin,
            element,
            big_endian,
            data_file,
        })
    }

    fn decode(&self, raw: &[u8]) -> Result<Vec<u8>, String> {
        let count = voxel_count(self.dims)
            .ok_or_else(|| format!("DimSize {:?} is too large", self.dims))?;
        match self.element {
            ElementType::UChar => {
                if raw.len() < count {
                    return Err(format!("expected {count} bytes, found {}", raw.len()));
                }
                Ok(raw[..count].to_vec())
            }
            ElementType::UShort => {
                let bytes = count
                    .checked_mul(2)
                    .ok_or_else(|| format!("DimSize {:?} is too large", self.dims))?;
                if raw.len() < bytes {
                    return Err(format!("expected {bytes} bytes, found {}", raw.len()));
                }
                let wide: Vec<u16> = raw[..bytes]
                    .chunks_exact(2)
                    .map(|b| {
                        if self.big_endian {
                            u16::from_be_bytes([b[0], b[1]])
                        } else {
                            u16::from_le_bytes([b[0], b[1]])
                        }
                    })
                    .collect();
                let max = f64::from(wide.iter().copied().max().unwrap_or(0).max(1));
                Ok(wide
                    .iter()
                    .map(|&v| (f64::from(v) / max * 255.0).round() as u8)
                    .collect())
            }
        }
    }
}

fn numbers<T: std::str::FromStr>(s: &str) -> Result<Vec<T>, String> {
    s.split_whitespace()
        .map(|t| t.parse::<T>().map_err(|_| format!("bad number '{t}'")))
        .collect()
}

/// Write `volume` as an uncompressed `MET_UCHAR` MetaImage pair next to `header_path`.
pub fn save_mhd(volume: &Volume, header_path: &Path) -> MovieResult<PathBuf> {
    let raw_path = header_path.with_extension("raw");
    let raw_name = raw_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| MovieError::validation("volume header path has no file name"))?;
    let [x, y, z] = volume.dims;
    let (s, o) = (volume.spacing, volume.origin);
    let header = format!(
        "ObjectType = Image\nNDims = 3\nDimSize = {x} {y} {z}\nElementSpacing = {} {} {}\nOffset = {} {} {}\nElementType = MET_UCHAR\nElementDataFile = {raw_name}\n",
        s.x, s.y, s.z, o.x, o.y, o.z
    );
    std::fs::write(header_path, header)
        .with_context(|| format!("write volume header '{}'", header_path.display()))?;
    std::fs::write(&raw_path, &volume.voxels)
        .with_context(|| format!("write volume data '{}'", raw_path.display()))?;
    Ok(raw_path)
}

#[cfg(test)]
#[path = "../../tests/unit/resources/volume.rs"]
mod tests;
