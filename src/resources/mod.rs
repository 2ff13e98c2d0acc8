//! Movie input data: surface meshes, scalar volumes and the background loader that reads them.

/// Background loading of the full resource set.
pub mod loader;
/// Triangle meshes and plane contours.
pub mod mesh;
/// Scalar volumes, MetaImage I/O and reslicing.
pub mod volume;
