use std::path::{Path, PathBuf};
use std::panic::AssertUnwindSafe;
use std::sync::mpsc;
use std::thread::JoinHandle;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::JobId;
use crate::foundation::error::{MovieError, MovieResult};
use crate::resources::mesh::Mesh;
use crate::resources::volume::Volume;

/// File names of everything a movie needs, relative to a resource directory.
///
/// A `resources.json` file in the directory overrides these defaults; missing keys keep them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceManifest {
    /// Right hemisphere surface. Default: `rhmesh.obj`.
    pub right_mesh: PathBuf,
    /// Left hemisphere surface. Default: `lhmesh.obj`.
    pub left_mesh: PathBuf,
    /// Primary volume. Default: `volume.mhd`.
    pub volume: PathBuf,
    /// Secondary volume blended into reslices. Optional.
    pub overlay_volume: Option<PathBuf>,
    /// Logo images composited over every frame.
    pub logos: Vec<PathBuf>,
}

impl Default for ResourceManifest {
    fn default() -> Self {
        Self {
            right_mesh: PathBuf::from("rhmesh.obj"),
            left_mesh: PathBuf::from("lhmesh.obj"),
            volume: PathBuf::from("volume.mhd"),
            overlay_volume: None,
            logos: Vec::new(),
        }
    }
}

/// Name of the optional manifest file inside a resource directory.
pub const MANIFEST_FILE: &str = "resources.json";

impl ResourceManifest {
    /// Manifest for `dir`: `resources.json` if present, defaults otherwise. Paths come back
    /// resolved against `dir`.
    pub fn in_dir(dir: &Path) -> MovieResult<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let text = std::fs::read_to_string(&manifest_path)
                .with_context(|| format!("read manifest '{}'", manifest_path.display()))?;
            serde_json::from_str(&text).map_err(|e| {
                MovieError::serde(format!("parse manifest '{}': {e}", manifest_path.display()))
            })?
        } else {
            Self::default()
        };
        Ok(manifest.resolved(dir))
    }

    fn resolved(self, dir: &Path) -> Self {
        Self {
            right_mesh: dir.join(self.right_mesh),
            left_mesh: dir.join(self.left_mesh),
            volume: dir.join(self.volume),
            overlay_volume: self.overlay_volume.map(|p| dir.join(p)),
            logos: self.logos.into_iter().map(|p| dir.join(p)).collect(),
        }
    }

    fn required_files(&self) -> impl Iterator<Item = &Path> {
        [&self.right_mesh, &self.left_mesh, &self.volume]
            .into_iter()
            .chain(self.overlay_volume.iter())
            .chain(self.logos.iter())
            .map(PathBuf::as_path)
    }
}

/// Everything loaded for one movie.
#[derive(Clone, Debug)]
pub struct ResourceSet {
    /// Both hemispheres merged into one mesh.
    pub mesh: Mesh,
    /// Primary volume.
    pub volume: Volume,
    /// Secondary volume, if configured.
    pub overlay_volume: Option<Volume>,
    /// Decoded logo images.
    pub logos: Vec<image::RgbaImage>,
}

/// Load every resource named by `manifest`.
///
/// Existence is checked for all files before anything is decoded, so a missing file fails the
/// whole load with one message naming it and nothing partial is returned.
#[tracing::instrument(skip(manifest), fields(volume = %manifest.volume.display()))]
pub fn load_resources(manifest: &ResourceManifest) -> MovieResult<ResourceSet> {
    if let Some(missing) = manifest.required_files().find(|p| !p.exists()) {
        let shown = std::path::absolute(missing).unwrap_or_else(|_| missing.to_path_buf());
        return Err(MovieError::resource(format!("can't find {}", shown.display())));
    }

    let mut mesh = Mesh::load_obj(&manifest.right_mesh)?;
    mesh.append(&Mesh::load_obj(&manifest.left_mesh)?);

    let volume = Volume::load_mhd(&manifest.volume)?;
    let overlay_volume = manifest
        .overlay_volume
        .as_deref()
        .map(Volume::load_mhd)
        .transpose()?;

    let logos = manifest
        .logos
        .iter()
        .map(|p| {
            image::open(p)
                .map(|img| img.to_rgba8())
                .map_err(|e| MovieError::resource(format!("decode logo '{}': {e}", p.display())))
        })
        .collect::<MovieResult<Vec<_>>>()?;

    tracing::info!(
        triangles = mesh.triangles.len(),
        overlay = overlay_volume.is_some(),
        logos = logos.len(),
        "resources loaded"
    );
    Ok(ResourceSet {
        mesh,
        volume,
        overlay_volume,
        logos,
    })
}

/// Result of one background load, tagged with the job that produced it.
#[derive(Debug)]
pub struct LoaderReport {
    /// Job that produced this report.
    pub job: JobId,
    /// Loaded resources or the single load error.
    pub result: MovieResult<ResourceSet>,
}

/// Runs resource loads on a worker thread and drops reports from superseded jobs.
///
/// Each job gets its own channel, so a worker that dies without reporting disconnects it and
/// [`ResourceLoader::wait`] returns an error instead of blocking.
#[derive(Debug)]
pub struct ResourceLoader {
    next_job: u64,
    current: Option<JobId>,
    rx: Option<mpsc::Receiver<LoaderReport>>,
    workers: Vec<JoinHandle<()>>,
}

impl Default for ResourceLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLoader {
    /// Create an idle loader.
    pub fn new() -> Self {
        Self {
            next_job: 0,
            current: None,
            rx: None,
            workers: Vec::new(),
        }
    }

    /// Start loading `manifest` in the background. Any job still in flight is superseded.
    pub fn load(&mut self, manifest: ResourceManifest) -> MovieResult<JobId> {
        let job = JobId(self.next_job);
        self.next_job += 1;
        self.current = Some(job);

        let (tx, rx) = mpsc::channel();
        self.rx = Some(rx);
        let handle = std::thread::Builder::new()
            .name(format!("resource-loader-{}", job.0))
            .spawn(move || {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| load_resources(&manifest)))
                    .unwrap_or_else(|panic| {
                        Err(MovieError::resource(format!(
                            "resource load failed: {}",
                            panic_message(panic.as_ref())
                        )))
                    });
                // The loader may have moved on to a newer job; nothing to report to then.
                let _ = tx.send(LoaderReport { job, result });
            })
            .context("spawn resource loader thread")?;
        self.workers.retain(|w| !w.is_finished());
        self.workers.push(handle);
        Ok(job)
    }

    /// Job whose result will be accepted next.
    pub fn current_job(&self) -> Option<JobId> {
        self.current
    }

    /// Block until the current job reports. Reports from superseded jobs are discarded.
    pub fn wait(&mut self) -> MovieResult<ResourceSet> {
        let current = self
            .current
            .ok_or_else(|| MovieError::resource("no resource load in progress"))?;
        let rx = self
            .rx
            .take()
            .ok_or_else(|| MovieError::resource("no resource load in progress"))?;
        self.current = None;
        loop {
            let report = rx
                .recv()
                .map_err(|_| MovieError::resource("resource loader stopped unexpectedly"))?;
            if report.job == current {
                return report.result;
            }
            tracing::debug!(job = report.job.0, "dropping superseded resource load");
        }
    }

    /// Non-blocking variant of [`ResourceLoader::wait`].
    pub fn poll(&mut self) -> Option<MovieResult<ResourceSet>> {
        let current = self.current?;
        let rx = self.rx.as_ref()?;
        loop {
            match rx.try_recv() {
                Ok(report) if report.job == current => {
                    self.current = None;
                    self.rx = None;
                    return Some(report.result);
                }
                Ok(report) => {
                    tracing::debug!(job = report.job.0, "dropping superseded resource load");
                }
                Err(mpsc::TryRecvError::Empty) => return None,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.current = None;
                    self.rx = None;
                    return Some(Err(MovieError::resource(
                        "resource loader stopped unexpectedly",
                    )));
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("worker panicked")
}

#[cfg(test)]
#[path = "../../tests/unit/resources/loader.rs"]
mod tests;
