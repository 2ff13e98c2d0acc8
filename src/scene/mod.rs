//! The scene the script animates and the controller renders.
//!
//! [`handle::SceneHandle`] is the seam: the movie pipeline only ever talks to a scene through it.

/// Scene trait, shared-handle alias and the value types passed through it.
pub mod handle;
/// Call-recording scene for tests and dry runs.
pub mod recording;
/// CPU preview scene.
pub mod software;
