use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use scimovie::scene::handle::share;
use scimovie::{
    CameraPose, DVec3, MovieSession, PngSequenceSink, ResourceLoader, ResourceManifest, Script,
    Settings, SoftwareScene,
};

#[derive(Parser, Debug)]
#[command(name = "scimovie", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a movie script and encode the captured frames (requires the configured encoder).
    Render(RenderArgs),
    /// Render the first frame of the scene as a PNG.
    Still(StillArgs),
    /// Write a settings file with every default spelled out.
    InitConfig(InitConfigArgs),
    /// Store a camera pose in the settings file.
    SaveCamera(SaveCameraArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Settings JSON. Missing files mean defaults.
    #[arg(long)]
    settings: PathBuf,

    /// Directory holding the meshes, the volume and an optional `resources.json`.
    #[arg(long)]
    resources: PathBuf,

    /// Movie script JSON. Defaults to the built-in movie.
    #[arg(long)]
    script: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct StillArgs {
    /// Settings JSON. Missing files mean defaults.
    #[arg(long)]
    settings: PathBuf,

    /// Directory holding the meshes, the volume and an optional `resources.json`.
    #[arg(long)]
    resources: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct InitConfigArgs {
    /// Output settings JSON.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct SaveCameraArgs {
    /// Settings JSON to update.
    #[arg(long)]
    settings: PathBuf,

    /// Eye position as `x,y,z`.
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    position: DVec3,

    /// Look-at point as `x,y,z`.
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    focal: DVec3,

    /// Zoom factor. Keeps the saved value when omitted.
    #[arg(long)]
    zoom: Option<f64>,

    /// Roll in degrees. Keeps the saved value when omitted.
    #[arg(long, allow_hyphen_values = true)]
    roll: Option<f64>,
}

fn parse_vec3(s: &str) -> Result<DVec3, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in '{s}': {e}"))?;
    match parts.as_slice() {
        [x, y, z] => Ok(DVec3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z, got '{s}'")),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Still(args) => cmd_still(args),
        Command::InitConfig(args) => cmd_init_config(args),
        Command::SaveCamera(args) => cmd_save_camera(args),
    }
}

fn open_session(
    settings_path: &Path,
    resources: &Path,
    script: Option<&Path>,
) -> anyhow::Result<MovieSession> {
    let settings = Settings::load(settings_path)?;
    let script = match script {
        Some(path) => Script::load(path)?,
        None => Script::default_movie(),
    };

    let mut loader = ResourceLoader::new();
    loader.load(ResourceManifest::in_dir(resources)?)?;
    let set = loader
        .wait()
        .with_context(|| format!("load resources from '{}'", resources.display()))?;
    let scene = SoftwareScene::new(set, settings.viewport)?;

    Ok(MovieSession::new(
        settings,
        script,
        share(scene),
        Box::new(PngSequenceSink::default()),
    ))
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut session = open_session(&args.settings, &args.resources, args.script.as_deref())?;
    let summary = session.run_to_completion()?;

    for warning in summary.warnings() {
        eprintln!("warning: {warning}");
    }
    for report in summary.encodes.iter().filter(|r| r.warning().is_none()) {
        eprintln!("wrote {}", report.out_path.display());
    }
    eprintln!(
        "{} frames, {:?}",
        summary.frames_captured, summary.report.outcome
    );

    session.shutdown(&args.settings)?;
    Ok(())
}

fn cmd_still(args: StillArgs) -> anyhow::Result<()> {
    let mut session = open_session(&args.settings, &args.resources, None)?;
    session.still(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    Settings::default().save(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_save_camera(args: SaveCameraArgs) -> anyhow::Result<()> {
    let mut settings = Settings::load(&args.settings)?;
    let pose = CameraPose {
        position: args.position,
        focal_point: args.focal,
        zoom: args.zoom.unwrap_or(settings.camera.zoom),
        roll: args.roll.unwrap_or(settings.camera.roll),
    };
    pose.validate()?;
    settings.camera = pose;
    settings.save(&args.settings)?;
    eprintln!("saved camera to {}", args.settings.display());
    Ok(())
}
