use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::capture::frames::FrameCapture;
use crate::capture::sink::FrameSink;
use crate::capture::target::{OutputRequest, OutputTarget, TargetTag};
use crate::config::settings::Settings;
use crate::encode::ffmpeg::{
    EncodeJob, EncodeReport, ensure_parent_dir, resolve_executable, run_encode_jobs,
};
use crate::foundation::core::{Fps, FrameIndex, RunId, Size};
use crate::foundation::error::{MovieError, MovieResult};
use crate::scene::handle::{SharedScene, with_scene};
use crate::script::engine::{EngineState, RunReport, ScriptEngine};
use crate::script::movie::Script;
use crate::sync::gate::{FrameGate, GateOpts, GateSignal, GateStats};

/// How long the controller waits on the gate per pump while driving a run to completion.
const PUMP_INTERVAL: Duration = Duration::from_millis(250);

/// What a run needs from the outside world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRequest {
    /// Directory receiving frames and movies. Must already exist.
    pub output_dir: PathBuf,
    /// Encoder executable, bare name or path.
    pub encoder_path: PathBuf,
    /// Selected targets.
    pub targets: Vec<TargetTag>,
}

impl RunRequest {
    /// Request described by `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            output_dir: settings.output_dir.clone(),
            encoder_path: settings.encoder_path.clone(),
            targets: settings.targets.tags(),
        }
    }
}

/// A [`RunRequest`] that passed preflight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckedRun {
    /// Existing output directory.
    pub output_dir: PathBuf,
    /// Resolved encoder executable.
    pub encoder: PathBuf,
    /// Resolved targets.
    pub request: OutputRequest,
}

/// Check a run request without touching any state.
///
/// Fails with a validation error when the output directory is missing, the encoder cannot be
/// found, or no target is selected.
pub fn preflight(request: &RunRequest, viewport: Size) -> MovieResult<CheckedRun> {
    if !request.output_dir.is_dir() {
        return Err(MovieError::validation(format!(
            "output directory '{}' does not exist",
            request.output_dir.display()
        )));
    }
    let encoder = resolve_executable(&request.encoder_path)?;
    let targets = OutputRequest::new(&request.targets, viewport)?;
    Ok(CheckedRun {
        output_dir: request.output_dir.clone(),
        encoder,
        request: targets,
    })
}

/// Result of one [`MovieSession::pump`] call.
#[derive(Clone, Debug, PartialEq)]
pub enum PumpStatus {
    /// A frame was captured and released.
    Captured(FrameIndex),
    /// Nothing to do within the timeout.
    Waiting,
    /// The script thread exited and was joined.
    Finished(RunSummary),
}

/// Everything known about a finished run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// Engine report.
    pub report: RunReport,
    /// Frames written.
    pub frames_captured: u64,
    /// One report per target, empty unless the run completed.
    pub encodes: Vec<EncodeReport>,
}

impl RunSummary {
    /// Per-target encoder warnings.
    pub fn warnings(&self) -> Vec<String> {
        self.encodes.iter().filter_map(EncodeReport::warning).collect()
    }
}

#[derive(Debug)]
struct ActiveRun {
    run: RunId,
    output_dir: PathBuf,
    encoder: PathBuf,
    targets: Vec<OutputTarget>,
}

/// The controller: owns the scene, drives the gate, captures frames and encodes.
pub struct MovieSession {
    settings: Settings,
    scene: SharedScene,
    gate: Arc<FrameGate>,
    engine: ScriptEngine,
    capture: FrameCapture,
    active: Option<ActiveRun>,
}

impl std::fmt::Debug for MovieSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieSession")
            .field("engine", &self.engine)
            .field("capture", &self.capture)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl MovieSession {
    /// Create a session with an unbounded gate.
    pub fn new(
        settings: Settings,
        script: Script,
        scene: SharedScene,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        Self::with_gate(settings, script, scene, sink, GateOpts::default())
    }

    /// Create a session whose gate uses `opts`.
    pub fn with_gate(
        settings: Settings,
        script: Script,
        scene: SharedScene,
        sink: Box<dyn FrameSink>,
        opts: GateOpts,
    ) -> Self {
        let gate = Arc::new(FrameGate::new(opts));
        let engine = ScriptEngine::new(script, scene.clone(), gate.clone());
        Self {
            settings,
            scene,
            gate,
            engine,
            capture: FrameCapture::new(sink),
            active: None,
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable settings; changes apply from the next run.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// The engine's last error, if any.
    pub fn engine_error(&self) -> Option<String> {
        self.engine.error()
    }

    /// Engine lifecycle state.
    pub fn engine_state(&self) -> EngineState {
        self.engine.state()
    }

    /// Gate counters of the current or last run.
    pub fn gate_stats(&self) -> GateStats {
        self.gate.stats()
    }

    /// Index the next captured frame will get.
    pub fn next_frame_index(&self) -> FrameIndex {
        self.capture.next_index()
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Run preflight against the current settings and scene viewport.
    pub fn preflight(&self) -> MovieResult<CheckedRun> {
        let viewport = with_scene(&self.scene, |s| Ok(s.viewport()))?;
        preflight(&RunRequest::from_settings(&self.settings), viewport)
    }

    /// Start a new run from frame 0.
    ///
    /// Preflight runs first; a rejection leaves the session exactly as it was.
    #[tracing::instrument(skip(self))]
    pub fn start(&mut self) -> MovieResult<RunId> {
        if self.active.is_some() {
            return Err(MovieError::script("a run is already in progress"));
        }
        let checked = self.preflight()?;

        let (quality, axes, camera) = (
            self.settings.quality,
            self.settings.axes_visible,
            self.settings.camera,
        );
        with_scene(&self.scene, |s| {
            s.apply_quality(&quality, axes)?;
            s.set_camera(&camera)
        })?;

        self.engine.restart()?;
        let run = self.engine.start()?;
        if let Err(e) = self.capture.begin(&checked.output_dir, &checked.request) {
            self.drain_worker();
            return Err(e);
        }
        let tags: Vec<TargetTag> = checked.request.targets().iter().map(|t| t.tag).collect();
        tracing::info!(
            run = run.0,
            targets = ?tags,
            dir = %checked.output_dir.display(),
            "run started"
        );
        self.active = Some(ActiveRun {
            run,
            output_dir: checked.output_dir,
            encoder: checked.encoder,
            targets: checked.request.targets().to_vec(),
        });
        Ok(run)
    }

    /// Serve the gate once: capture a pending frame, or finish the run if the script exited.
    ///
    /// A capture failure cancels the run and is returned after the script thread is joined.
    pub fn pump(&mut self, timeout: Duration) -> MovieResult<PumpStatus> {
        if self.active.is_none() {
            return Err(MovieError::script("no run in progress"));
        }
        match self.gate.wait_for_request(timeout) {
            GateSignal::TimedOut => Ok(PumpStatus::Waiting),
            GateSignal::CaptureRequested => {
                let capture = &mut self.capture;
                match with_scene(&self.scene, |s| capture.capture(s)) {
                    Ok(idx) => {
                        self.gate.release_frame();
                        Ok(PumpStatus::Captured(idx))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "frame capture failed, cancelling run");
                        self.engine.cancel();
                        self.drain_worker();
                        self.capture.end().ok();
                        self.active = None;
                        Err(e)
                    }
                }
            }
            GateSignal::Closed => self.finish(true).map(PumpStatus::Finished),
        }
    }

    /// Pump until the script exits, then return its summary.
    pub fn run_to_completion(&mut self) -> MovieResult<RunSummary> {
        if self.active.is_none() {
            self.start()?;
        }
        loop {
            match self.pump(PUMP_INTERVAL)? {
                PumpStatus::Captured(idx) if idx.0 % 100 == 0 => {
                    tracing::debug!(frame = idx.0, "capturing");
                }
                PumpStatus::Captured(_) | PumpStatus::Waiting => {}
                PumpStatus::Finished(summary) => return Ok(summary),
            }
        }
    }

    /// Cancel the current run and wait for the script thread. Nothing is encoded.
    #[tracing::instrument(skip(self))]
    pub fn stop(&mut self) -> MovieResult<Option<RunSummary>> {
        if self.active.is_none() {
            return Ok(None);
        }
        self.engine.cancel();
        self.drain_until_closed();
        self.finish(false).map(Some)
    }

    // Release whatever the script still requests until it exits.
    fn drain_until_closed(&self) {
        loop {
            match self.gate.wait_for_request(PUMP_INTERVAL) {
                GateSignal::CaptureRequested => {
                    self.gate.release_frame();
                }
                GateSignal::Closed => return,
                GateSignal::TimedOut => {}
            }
        }
    }

    fn drain_worker(&mut self) {
        self.engine.cancel();
        self.drain_until_closed();
        if let Err(e) = self.engine.join() {
            tracing::warn!(error = %e, "script thread join failed");
        }
    }

    fn finish(&mut self, encode: bool) -> MovieResult<RunSummary> {
        let report = self.engine.join()?;
        let frames_captured = self.capture.next_index().0;
        self.capture.end()?;
        let active = self
            .active
            .take()
            .ok_or_else(|| MovieError::script("no run in progress"))?;
        debug_assert_eq!(active.run, report.run);

        let encodes = if encode && report.completed() {
            let jobs: Vec<EncodeJob> = active
                .targets
                .iter()
                .map(|t| EncodeJob::for_target(&active.output_dir, t))
                .collect();
            run_encode_jobs(&active.encoder, &jobs)
        } else {
            Vec::new()
        };
        let summary = RunSummary {
            report,
            frames_captured,
            encodes,
        };
        tracing::info!(
            run = summary.report.run.0,
            frames = frames_captured,
            seconds = Fps::MOVIE.frames_to_secs(frames_captured),
            outcome = ?summary.report.outcome,
            warnings = summary.warnings().len(),
            "run finished"
        );
        Ok(summary)
    }

    /// Render the scene once with the current settings and write it as a PNG.
    #[tracing::instrument(skip(self))]
    pub fn still(&mut self, out: &Path) -> MovieResult<()> {
        if self.active.is_some() {
            return Err(MovieError::script("cannot render a still during a run"));
        }
        let (quality, axes, camera) = (
            self.settings.quality,
            self.settings.axes_visible,
            self.settings.camera,
        );
        let frame = with_scene(&self.scene, |s| {
            s.apply_quality(&quality, axes)?;
            s.set_camera(&camera)?;
            s.render(1)
        })?;
        ensure_parent_dir(out)?;
        frame
            .to_image()?
            .save_with_format(out, image::ImageFormat::Png)
            .with_context(|| format!("write still '{}'", out.display()))?;
        Ok(())
    }

    /// Store the scene's current camera in the settings and write them to `path`.
    pub fn save_camera(&mut self, path: &Path) -> MovieResult<()> {
        let camera = with_scene(&self.scene, |s| Ok(s.camera()))?;
        camera.validate()?;
        self.settings.camera = camera;
        self.settings.save(path)
    }

    /// Stop any run and persist the settings to `path`.
    pub fn shutdown(mut self, path: &Path) -> MovieResult<()> {
        self.stop()?;
        self.settings.save(path)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/movie_session.rs"]
mod tests;
