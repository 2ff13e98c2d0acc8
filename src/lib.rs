//! scimovie renders scripted scientific-visualization movies.
//!
//! A script thread mutates a shared scene one frame at a time and blocks on a [`FrameGate`]
//! until the controller has captured that frame. The controller is a [`MovieSession`]:
//!
//! - Load resources and build a scene behind the [`SceneHandle`] trait
//! - Start a run, which preflights the output directory, the encoder and the targets
//! - Pump the gate, writing `Frame_<TAG>_<NNNNN>.png` for every enabled target
//! - On completion, encode each target's frames into `out_<TAG>.mp4`
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Frame capture and output targets.
pub mod capture;
/// Persisted settings.
pub mod config;
/// Post-run encoding.
pub mod encode;
/// Mesh, volume and logo loading.
pub mod resources;
/// The scene capability and its implementations.
pub mod scene;
/// Movie scripts and the engine running them.
pub mod script;
/// The controller.
pub mod session;
/// Script/controller rendezvous.
pub mod sync;

pub use crate::foundation::core::{Axis, Bounds3, DVec3, Fps, FrameIndex, JobId, RunId, Size};
pub use crate::foundation::error::{MovieError, MovieResult};

pub use crate::capture::sink::{FrameSink, InMemorySink, PngSequenceSink, SinkConfig};
pub use crate::capture::target::{OutputRequest, OutputTarget, TargetTag};
pub use crate::config::settings::{CameraPose, RenderQuality, Settings, TargetSelection};
pub use crate::encode::ffmpeg::{EncodeJob, EncodeReport};
pub use crate::resources::loader::{ResourceLoader, ResourceManifest, ResourceSet};
pub use crate::scene::handle::{FrameRGBA, SceneHandle, SceneObject, SharedScene};
pub use crate::scene::recording::RecordingScene;
pub use crate::scene::software::SoftwareScene;
pub use crate::script::engine::{EngineState, RunOutcome, RunReport, ScriptEngine};
pub use crate::script::movie::Script;
pub use crate::script::stage::Stage;
pub use crate::session::movie_session::{MovieSession, PumpStatus, RunRequest, RunSummary};
pub use crate::sync::gate::{FrameGate, GateOpts};
