//! Post-run video encoding through an external encoder process.

/// Encoder jobs, their arguments and per-target reports.
pub mod ffmpeg;
