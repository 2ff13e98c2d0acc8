//! Per-frame capture of the rendered scene to image files.

/// Frame rendering per target and the index-advancing capture step.
pub mod frames;
/// Frame sinks: PNG sequence writer and in-memory sink.
pub mod sink;
/// Output targets and frame/movie file naming.
pub mod target;
