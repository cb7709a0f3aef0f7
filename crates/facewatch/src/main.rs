use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use facewatch_core::{
    DescriptorBackend, EmbeddingMatcher, LocalBackend, Matcher, RemoteBackend, RemoteConfig,
    RemoteMatcher,
};
use facewatch_video::{Camera, FrameSource, VideoWindow};
use tracing_subscriber::EnvFilter;

mod config;
mod gallery;
mod logger;
mod pipeline;

use config::Config;
use gallery::Gallery;
use logger::NewFaceLogger;
use pipeline::{Cadence, Pipeline};

const WINDOW_TITLE: &str = "Face Recognition";

#[derive(Parser)]
#[command(name = "facewatch", about = "Live face recognition against a folder of known faces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live recognition loop
    Run(RunArgs),
    /// List available V4L2 capture devices
    Devices,
    /// Load the known-faces gallery and report what enrolled
    Gallery(GalleryArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Detection/matching strategy
    #[arg(long, value_enum, default_value_t = BackendKind::Local)]
    backend: BackendKind,
    /// V4L2 device path
    #[arg(long)]
    device: Option<String>,
    /// Directory of labeled reference images
    #[arg(long)]
    known_faces: Option<std::path::PathBuf>,
    /// Directory for unrecognized face crops
    #[arg(long)]
    new_faces: Option<std::path::PathBuf>,
    /// Remote face API base URL (remote backend only)
    #[arg(long)]
    endpoint: Option<String>,
    /// Run detection on every n-th frame
    #[arg(long)]
    process_interval: Option<u32>,
    /// Process every other frame instead of every n-th
    #[arg(long)]
    alternating: bool,
    /// Minimum seconds between two new-face writes
    #[arg(long)]
    log_interval: Option<u64>,
    /// Minimum seconds between two gallery reloads
    #[arg(long)]
    refresh_interval: Option<u64>,
    /// Linear downscale factor applied before detection
    #[arg(long)]
    downscale: Option<f32>,
    /// Strict embedding-distance acceptance threshold
    #[arg(long)]
    distance_threshold: Option<f32>,
    /// Embedding same-person decision threshold
    #[arg(long)]
    match_threshold: Option<f32>,
    /// Remote pairwise similarity (0-100) needed for a match
    #[arg(long)]
    similarity_threshold: Option<f32>,
    /// Remote detector confidence (0-100) below which unknowns are not logged
    #[arg(long)]
    min_confidence_to_log: Option<f32>,
    /// Warmup frames to discard before the loop starts
    #[arg(long)]
    warmup_frames: Option<usize>,
}

#[derive(clap::Args)]
struct GalleryArgs {
    /// Detection/matching strategy used for enrollment
    #[arg(long, value_enum, default_value_t = BackendKind::Local)]
    backend: BackendKind,
    /// Directory of labeled reference images
    #[arg(long)]
    known_faces: Option<std::path::PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendKind {
    /// On-device ONNX detection and embeddings
    Local,
    /// HTTP detection/comparison API
    Remote,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Devices => devices(),
        Commands::Gallery(args) => gallery_report(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(device) = args.device {
        config.camera_device = device;
    }
    if let Some(dir) = args.known_faces {
        config.known_faces_dir = dir;
    }
    if let Some(dir) = args.new_faces {
        config.new_faces_dir = dir;
    }
    if let Some(endpoint) = args.endpoint {
        config.endpoint = Some(endpoint);
    }
    if let Some(n) = args.process_interval {
        config.process_interval = n;
    }
    if let Some(secs) = args.log_interval {
        config.log_interval_secs = secs;
    }
    if let Some(secs) = args.refresh_interval {
        config.refresh_interval_secs = secs;
    }
    if let Some(factor) = args.downscale {
        config.downscale_factor = factor;
    }
    if let Some(t) = args.distance_threshold {
        config.distance_threshold = t;
    }
    if let Some(t) = args.match_threshold {
        config.match_threshold = t;
    }
    if let Some(t) = args.similarity_threshold {
        config.similarity_threshold = t;
    }
    if let Some(t) = args.min_confidence_to_log {
        config.min_confidence_to_log = t;
    }
    if let Some(n) = args.warmup_frames {
        config.warmup_frames = n;
    }

    if !(config.downscale_factor > 0.0 && config.downscale_factor <= 1.0) {
        bail!("downscale factor must be in (0, 1], got {}", config.downscale_factor);
    }

    let mut backend = build_backend(args.backend, &config)?;
    let matcher: Box<dyn Matcher> = match args.backend {
        BackendKind::Local => Box::new(EmbeddingMatcher {
            distance_threshold: config.distance_threshold,
            match_threshold: config.match_threshold,
        }),
        BackendKind::Remote => Box::new(RemoteMatcher {
            similarity_threshold: config.similarity_threshold,
            min_confidence_to_log: config.min_confidence_to_log,
        }),
    };

    let (gallery, report) = Gallery::load(
        config.known_faces_dir.clone(),
        config.refresh_interval(),
        backend.as_mut(),
    )
    .context("failed to load known faces")?;
    tracing::info!(
        loaded = report.loaded.len(),
        skipped = report.skipped.len(),
        "gallery ready"
    );

    let logger = NewFaceLogger::new(config.new_faces_dir.clone(), config.log_interval());

    let cadence = if args.alternating {
        Cadence::Alternating
    } else {
        Cadence::EveryNth(config.process_interval)
    };

    let camera =
        Camera::open(&config.camera_device).context("failed to open camera")?;
    let mut stream = camera.stream().context("failed to start capture stream")?;

    for _ in 0..config.warmup_frames {
        if let Err(err) = stream.next_frame() {
            tracing::warn!(error = %err, "warmup frame failed");
        }
    }

    let mut window = VideoWindow::open(WINDOW_TITLE, camera.width, camera.height)
        .context("failed to open preview window")?;

    let mut pipeline = Pipeline::new(
        backend,
        matcher,
        gallery,
        logger,
        cadence,
        config.downscale_factor,
    );
    pipeline.run(&mut stream, &mut window)?;
    Ok(())
}

fn build_backend(kind: BackendKind, config: &Config) -> Result<Box<dyn DescriptorBackend>> {
    match kind {
        BackendKind::Local => {
            let backend = LocalBackend::load(&config.model_dir)
                .with_context(|| format!("failed to load models from {}", config.model_dir.display()))?;
            Ok(Box::new(backend))
        }
        BackendKind::Remote => {
            let Some(endpoint) = config.endpoint.clone() else {
                bail!("remote backend needs an endpoint (--endpoint or FACEWATCH_ENDPOINT)");
            };
            let backend = RemoteBackend::new(
                RemoteConfig {
                    endpoint,
                    region: config.remote_region.clone(),
                    api_key: config.api_key.clone(),
                },
                config.similarity_threshold,
            )?;
            Ok(Box::new(backend))
        }
    }
}

fn devices() -> Result<()> {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
        return Ok(());
    }
    for device in devices {
        println!("{}  {} ({}, {})", device.path, device.name, device.driver, device.bus);
    }
    Ok(())
}

fn gallery_report(args: GalleryArgs) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(dir) = args.known_faces {
        config.known_faces_dir = dir;
    }

    let mut backend = build_backend(args.backend, &config)?;
    let (_, report) = Gallery::load(
        config.known_faces_dir.clone(),
        config.refresh_interval(),
        backend.as_mut(),
    )
    .context("failed to load known faces")?;

    for label in &report.loaded {
        println!("enrolled  {label}");
    }
    for (name, reason) in &report.skipped {
        println!("skipped   {name}: {reason}");
    }
    println!("{} enrolled, {} skipped", report.loaded.len(), report.skipped.len());
    Ok(())
}
