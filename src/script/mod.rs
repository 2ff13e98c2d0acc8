//! Scripted animation: stages, the reslice sweep and the engine that runs them frame by frame.

/// Script thread lifecycle and run reports.
pub mod engine;
/// The stage list and the built-in movie.
pub mod movie;
/// Reslice sweep coordinate mapping and per-step updates.
pub mod reslice;
/// Stage definitions.
pub mod stage;
