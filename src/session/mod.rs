//! The controller side of a movie run.

/// Preflight, gate pumping, capture, stop/restart and post-run encoding.
pub mod movie_session;
