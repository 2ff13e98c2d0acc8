use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use anyhow::Context as _;

use crate::foundation::core::RunId;
use crate::foundation::error::{MovieError, MovieResult};
use crate::scene::handle::{SharedScene, with_scene};
use crate::script::movie::Script;
use crate::script::stage::{Flow, StageCtx};
use crate::sync::gate::{CloseOnDrop, FrameGate};

/// Engine lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Ready to start.
    Idle,
    /// The script thread is executing stages.
    Running,
    /// Cancellation was requested; the current stage is winding down.
    Aborting,
    /// The last run completed. Terminal until [`ScriptEngine::restart`].
    Finished,
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every stage ran to its end.
    Completed {
        /// Frames requested.
        frames: u64,
    },
    /// Stopped on cancellation.
    Cancelled {
        /// Frames requested before stopping.
        frames: u64,
    },
    /// A stage failed.
    Failed(String),
}

/// Result of one run, tagged with the run that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Run that produced this report.
    pub run: RunId,
    /// How it ended.
    pub outcome: RunOutcome,
}

impl RunReport {
    /// Whether the run completed normally.
    pub fn completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }
}

#[derive(Debug)]
struct Status {
    state: EngineState,
    error: Option<String>,
}

/// Runs a [`Script`] on its own thread, one gated frame at a time.
pub struct ScriptEngine {
    script: Arc<Script>,
    scene: SharedScene,
    gate: Arc<FrameGate>,
    status: Arc<Mutex<Status>>,
    next_run: u64,
    worker: Option<(RunId, JoinHandle<RunReport>)>,
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("stages", &self.script.stages.len())
            .field("status", &self.status)
            .field("next_run", &self.next_run)
            .field("running", &self.worker.as_ref().map(|(run, _)| *run))
            .finish_non_exhaustive()
    }
}

fn lock_status(status: &Mutex<Status>) -> MutexGuard<'_, Status> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptEngine {
    /// Create an engine for `script` over `scene`.
    ///
    /// The script and the scene are checked here. A failure is kept in [`ScriptEngine::error`]
    /// and makes [`ScriptEngine::start`] refuse to run.
    pub fn new(script: Script, scene: SharedScene, gate: Arc<FrameGate>) -> Self {
        let error = script
            .validate()
            .and_then(|()| with_scene(&scene, |s| script.check_scene(&*s)))
            .err()
            .map(|e| e.to_string());
        if let Some(e) = &error {
            tracing::warn!(error = %e, "script cannot run on this scene");
        }
        Self {
            script: Arc::new(script),
            scene,
            gate,
            status: Arc::new(Mutex::new(Status {
                state: EngineState::Idle,
                error,
            })),
            next_run: 0,
            worker: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        lock_status(&self.status).state
    }

    /// Readable description of the last failure, if any.
    pub fn error(&self) -> Option<String> {
        lock_status(&self.status).error.clone()
    }

    /// Whether a script thread has been started and not yet joined.
    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Run currently owning the script thread.
    pub fn current_run(&self) -> Option<RunId> {
        self.worker.as_ref().map(|(run, _)| *run)
    }

    /// Spawn the script thread. Only valid from [`EngineState::Idle`] with no construction error.
    #[tracing::instrument(skip(self))]
    pub fn start(&mut self) -> MovieResult<RunId> {
        {
            let status = lock_status(&self.status);
            if status.state != EngineState::Idle || self.worker.is_some() {
                return Err(MovieError::script(format!(
                    "cannot start script while {:?}",
                    status.state
                )));
            }
        }
        if let Err(e) = self.refuse_if_unrunnable() {
            lock_status(&self.status).error = Some(e.to_string());
            return Err(e);
        }
        lock_status(&self.status).error = None;

        let run = RunId(self.next_run);
        self.next_run += 1;
        self.gate.reset();

        let script = self.script.clone();
        let scene = self.scene.clone();
        let gate = self.gate.clone();
        let status = self.status.clone();
        lock_status(&self.status).state = EngineState::Running;
        let handle = std::thread::Builder::new()
            .name(format!("movie-script-{}", run.0))
            .spawn(move || run_script(run, &script, &scene, &gate, &status))
            .context("spawn script thread");
        let handle = match handle {
            Ok(h) => h,
            Err(e) => {
                lock_status(&self.status).state = EngineState::Idle;
                return Err(e.into());
            }
        };
        self.worker = Some((run, handle));
        tracing::info!(run = run.0, stages = self.script.stages.len(), "script started");
        Ok(run)
    }

    fn refuse_if_unrunnable(&self) -> MovieResult<()> {
        self.script.validate()?;
        with_scene(&self.scene, |s| self.script.check_scene(&*s))
    }

    /// Ask the running script to stop at its next check.
    pub fn cancel(&self) {
        self.gate.cancel();
        let mut status = lock_status(&self.status);
        if status.state == EngineState::Running {
            status.state = EngineState::Aborting;
        }
    }

    /// Wait for the script thread and collect its report.
    ///
    /// The caller must keep releasing frames until the gate closes, or this blocks forever.
    pub fn join(&mut self) -> MovieResult<RunReport> {
        let (run, handle) = self
            .worker
            .take()
            .ok_or_else(|| MovieError::script("no script thread to join"))?;
        match handle.join() {
            Ok(report) => Ok(report),
            Err(_) => {
                let message = "script thread panicked".to_owned();
                let mut status = lock_status(&self.status);
                status.state = EngineState::Idle;
                status.error = Some(message.clone());
                Ok(RunReport {
                    run,
                    outcome: RunOutcome::Failed(message),
                })
            }
        }
    }

    /// Return to [`EngineState::Idle`] for a fresh run: clears cancellation and reopens the gate.
    pub fn restart(&mut self) -> MovieResult<()> {
        if self.worker.is_some() {
            return Err(MovieError::script(
                "cannot restart while a script thread is running",
            ));
        }
        self.gate.reset();
        lock_status(&self.status).state = EngineState::Idle;
        Ok(())
    }
}

#[tracing::instrument(skip_all, fields(run = run.0))]
fn run_script(
    run: RunId,
    script: &Script,
    scene: &SharedScene,
    gate: &FrameGate,
    status: &Mutex<Status>,
) -> RunReport {
    // Declared first so the gate closes after the status below is published.
    let _close = CloseOnDrop(gate);
    let mut ctx = StageCtx::new(scene, gate);

    let result = (|| {
        for stage in &script.stages {
            if ctx.cancelled() || stage.run(&mut ctx)? == Flow::Cancelled {
                return Ok(Flow::Cancelled);
            }
        }
        Ok::<_, MovieError>(Flow::Continue)
    })();

    let frames = ctx.frames();
    let (state, outcome) = match result {
        Ok(Flow::Continue) => (EngineState::Finished, RunOutcome::Completed { frames }),
        Ok(Flow::Cancelled) => (EngineState::Idle, RunOutcome::Cancelled { frames }),
        Err(e) => (EngineState::Idle, RunOutcome::Failed(e.to_string())),
    };
    match &outcome {
        RunOutcome::Completed { .. } => tracing::info!(frames, "script completed"),
        RunOutcome::Cancelled { .. } => tracing::info!(frames, "script cancelled"),
        RunOutcome::Failed(e) => tracing::error!(frames, error = %e, "script failed"),
    }

    let mut s = lock_status(status);
    s.state = state;
    if let RunOutcome::Failed(e) = &outcome {
        s.error = Some(e.clone());
    }
    drop(s);

    RunReport { run, outcome }
}

#[cfg(test)]
#[path = "../../tests/unit/script/engine.rs"]
mod tests;
