use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context as _;

use crate::capture::target::{OutputTarget, TargetTag, frame_pattern, movie_file_name};
use crate::foundation::core::{Fps, Size};
use crate::foundation::error::{MovieError, MovieResult};

/// Encoder invocation for one target's frame sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeJob {
    /// Target the frames belong to.
    pub tag: TargetTag,
    /// Frame size, passed as `-s`.
    pub size: Size,
    /// Output frame rate.
    pub fps: Fps,
    /// printf-style path of the input frames.
    pub input_pattern: PathBuf,
    /// Movie file written by the encoder.
    pub out_path: PathBuf,
}

impl EncodeJob {
    /// Job encoding the frames of `target` found in `dir` into `dir/out_<TAG>.mp4` at 30 fps.
    pub fn for_target(dir: &Path, target: &OutputTarget) -> Self {
        Self {
            tag: target.tag,
            size: target.size,
            fps: Fps::MOVIE,
            input_pattern: dir.join(frame_pattern(target.tag)),
            out_path: dir.join(movie_file_name(target.tag)),
        }
    }

    /// Encoder arguments, in order.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            // Any stderr text becomes a warning, so silence ffmpeg's banner and progress lines.
            "-loglevel",
            "error",
            "-r",
            &self.fps.0.to_string(),
            "-y",
            "-s",
            &self.size.to_arg(),
            "-i",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(self.input_pattern.clone().into_os_string());
        args.extend(
            [
                "-vcodec", "libx264", "-crf", "1", "-pix_fmt", "yuv420p", "-qp", "0", "-f", "mp4",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(self.out_path.clone().into_os_string());
        args
    }

    /// Command running `exe` with [`EncodeJob::args`]. Stdout is discarded, stderr captured.
    pub fn command(&self, exe: &Path) -> Command {
        let mut cmd = Command::new(exe);
        cmd.args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

/// What happened to one encode job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeReport {
    /// Target encoded.
    pub tag: TargetTag,
    /// Movie file the job was asked to write.
    pub out_path: PathBuf,
    /// Whether the encoder exited successfully.
    pub success: bool,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// Everything the encoder wrote to stderr.
    pub stderr: String,
    /// Set when the encoder could not be started at all.
    pub spawn_error: Option<String>,
}

impl EncodeReport {
    /// Non-fatal warning for this target: spawn failure, non-zero exit, or any stderr output.
    pub fn warning(&self) -> Option<String> {
        if let Some(e) = &self.spawn_error {
            return Some(format!("{}: encoder could not start: {e}", self.tag));
        }
        let stderr = self.stderr.trim();
        match (self.success, stderr.is_empty()) {
            (true, true) => None,
            (true, false) => Some(format!("{}: {stderr}", self.tag)),
            (false, _) => {
                let code = self
                    .exit_code
                    .map_or_else(|| "signal".to_owned(), |c| c.to_string());
                Some(format!("{}: encoder exited with {code}: {stderr}", self.tag))
            }
        }
    }
}

/// Run `jobs` one after another, each to completion. A failing job never stops later ones.
pub fn run_encode_jobs(exe: &Path, jobs: &[EncodeJob]) -> Vec<EncodeReport> {
    jobs.iter().map(|job| run_encode_job(exe, job)).collect()
}

#[tracing::instrument(skip_all, fields(tag = %job.tag, out = %job.out_path.display()))]
fn run_encode_job(exe: &Path, job: &EncodeJob) -> EncodeReport {
    let mut report = EncodeReport {
        tag: job.tag,
        out_path: job.out_path.clone(),
        success: false,
        exit_code: None,
        stderr: String::new(),
        spawn_error: None,
    };
    match job.command(exe).output() {
        Ok(output) => {
            report.success = output.status.success();
            report.exit_code = output.status.code();
            report.stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        }
        Err(e) => report.spawn_error = Some(e.to_string()),
    }
    match report.warning() {
        None => tracing::info!("movie encoded"),
        Some(w) => tracing::warn!(warning = %w, "encoder reported a problem"),
    }
    report
}

/// Locate the encoder. Bare names are searched on `PATH`; anything with a directory part must
/// name an existing file.
pub fn resolve_executable(exe: &Path) -> MovieResult<PathBuf> {
    let bare = exe.components().count() == 1 && !exe.is_absolute();
    if !bare {
        return if exe.is_file() {
            Ok(exe.to_path_buf())
        } else {
            Err(MovieError::validation(format!(
                "encoder executable '{}' does not exist",
                exe.display()
            )))
        };
    }
    let path = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&path)
        .flat_map(|dir| executable_candidates(&dir, exe))
        .find(|p| p.is_file())
        .ok_or_else(|| {
            MovieError::validation(format!(
                "encoder executable '{}' was not found on PATH",
                exe.display()
            ))
        })
}

fn executable_candidates(dir: &Path, name: &Path) -> Vec<PathBuf> {
    let plain = dir.join(name);
    if cfg!(windows) && name.extension().is_none() {
        vec![plain.with_extension("exe"), plain]
    } else {
        vec![plain]
    }
}

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent_dir(path: &Path) -> MovieResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
