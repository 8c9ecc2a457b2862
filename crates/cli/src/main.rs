use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use face_relay_core::capture::domain::camera::CameraProvider;
use face_relay_core::capture::infrastructure::ffmpeg_camera::FfmpegCameraProvider;
use face_relay_core::capture::infrastructure::image_file_renderer::ImageFileRenderer;
use face_relay_core::detection::domain::face_analyser::FaceAnalyser;
use face_relay_core::detection::infrastructure::arcface_embedder::ArcFaceEmbedder;
use face_relay_core::detection::infrastructure::onnx_face_analyser::{
    OnnxFaceAnalyser, DEFAULT_CONFIDENCE,
};
use face_relay_core::mapping::domain::face_map::{FaceMapRegistry, SharedFaceMap};
use face_relay_core::mapping::target_faces_use_case::{write_thumbnails, TargetFacesUseCase};
use face_relay_core::pipeline::capture_session::CaptureSession;
use face_relay_core::pipeline::infrastructure::capture_worker::{self, CaptureEvent};
use face_relay_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use face_relay_core::pipeline::scrub_session::{navigate, ScrubSession};
use face_relay_core::processing::domain::processor_chain::FailurePolicy;
use face_relay_core::processing::infrastructure::processor_factory::build_chain;
use face_relay_core::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, FACE_ENHANCER_FLAG, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use face_relay_core::shared::frame::Frame;
use face_relay_core::shared::model_resolver;
use face_relay_core::shared::session_config::ConfigSnapshot;
use face_relay_core::video::domain::image_writer::ImageWriter;
use face_relay_core::video::domain::video_reader::{read_frame_at, ReaderFactory};
use face_relay_core::video::infrastructure::image_file_writer::ImageFileWriter;
use face_relay_core::video::infrastructure::reader_factory::DefaultReaderFactory;

/// Face replacement for images, videos and live cameras.
#[derive(Parser)]
#[command(name = "face-relay")]
struct Cli {
    /// Settings file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the effective settings back to the settings file.
    #[arg(long, global = true)]
    save_config: bool,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, global = true, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Skip the identity embedding model (disables face matching).
    #[arg(long, global = true)]
    no_embedding: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render one frame of a target image or video with the source face.
    Preview(PreviewArgs),
    /// Save a thumbnail of every distinct face in a target.
    Map(MapArgs),
    /// List capture devices.
    Cameras,
    /// Stream a camera through the processor chain.
    Live(LiveArgs),
}

/// Switches shared by preview and live.
#[derive(Args)]
struct ChainArgs {
    /// Replace every face instead of the left-most one.
    #[arg(long)]
    many_faces: bool,

    /// Sharpen faces after replacement.
    #[arg(long)]
    enhance: bool,

    /// Blend weight of the replaced face (0-100).
    #[arg(long)]
    opacity: Option<u32>,

    /// Keep going past a failing processor instead of dropping the frame.
    #[arg(long)]
    skip_failed: bool,
}

#[derive(Args)]
struct PreviewArgs {
    /// Target image or video.
    target: PathBuf,

    /// Image holding the face to paste.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Where to write the rendered frame.
    #[arg(long, short)]
    output: PathBuf,

    /// Frame index for video targets.
    #[arg(long, default_value_t = 0)]
    frame: usize,

    /// Move this many frames from --frame (negative steps back), stopping at
    /// either end of the video.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    step: i64,

    /// Exchange source and target before rendering.
    #[arg(long)]
    swap: bool,

    #[command(flatten)]
    chain: ChainArgs,
}

#[derive(Args)]
struct MapArgs {
    /// Target image or video.
    target: PathBuf,

    /// Directory for the face thumbnails.
    #[arg(long, short)]
    output_dir: PathBuf,

    /// Analyse every Nth video frame.
    #[arg(long, default_value_t = 10)]
    stride: usize,
}

#[derive(Args)]
struct LiveArgs {
    /// Camera index.
    #[arg(long, default_value_t = 0)]
    camera: usize,

    /// Image holding the face to paste in single mode.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Map a target face to a source face: TARGET_IMAGE=SOURCE_IMAGE.
    /// Enables mapped mode; may be repeated.
    #[arg(long, value_parser = parse_pair)]
    pair: Vec<(PathBuf, PathBuf)>,

    /// File overwritten with the latest frame.
    #[arg(long, short)]
    output: PathBuf,

    /// Stop after this many rendered frames.
    #[arg(long)]
    frames: Option<usize>,

    /// Flip frames horizontally.
    #[arg(long)]
    mirror: bool,

    /// Draw the frame rate on every frame.
    #[arg(long)]
    show_fps: bool,

    /// Fit frames to a WIDTHxHEIGHT display area.
    #[arg(long, value_parser = parse_size)]
    fit: Option<(u32, u32)>,

    #[command(flatten)]
    chain: ChainArgs,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config_path = cli.config.clone().or_else(ConfigSnapshot::default_path);
    let mut config = match &config_path {
        Some(path) => ConfigSnapshot::load_from(path)?,
        None => ConfigSnapshot::default(),
    };

    match &cli.command {
        Command::Preview(args) => {
            apply_chain_args(&mut config, &args.chain);
            run_preview(&cli, &mut config, args)?;
        }
        Command::Map(args) => run_map(&cli, args)?,
        Command::Cameras => run_cameras(),
        Command::Live(args) => {
            apply_chain_args(&mut config, &args.chain);
            config.live_mirror |= args.mirror;
            config.show_fps |= args.show_fps;
            config.live_resizable |= args.fit.is_some();
            run_live(&cli, &live_config(&config, args), args)?;
        }
    }

    if cli.save_config {
        let path = config_path.ok_or("no settings path available on this platform")?;
        config.save_to(&path)?;
        log::info!("Settings saved to {}", path.display());
    }
    Ok(())
}

fn run_preview(
    cli: &Cli,
    config: &mut ConfigSnapshot,
    args: &PreviewArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    config.source_path = args.source.clone();
    config.target_path = Some(args.target.clone());
    if args.swap {
        config.swap_paths();
    }
    let target = config
        .target_path
        .clone()
        .ok_or("--swap needs a --source to become the target")?;
    warn_if_ungated(config);

    let analyser = build_analyser(cli)?;
    let policy = failure_policy(&args.chain);
    let chain = build_chain(config, analyser.clone(), policy);
    let mut session = ScrubSession::new(
        Arc::new(DefaultReaderFactory),
        analyser,
        chain,
        Arc::new(config.clone()),
    )
    .with_logger(Box::new(StdoutPipelineLogger::default()));

    let total = session.frame_count(&target)?;
    let index = navigate(args.frame, args.step, total.saturating_sub(1));
    let scrubbed = session.render_preview(&target, index, config.source_path.as_deref())?;
    if !scrubbed.source_face_found {
        log::warn!("No face found in the source image; target shown unchanged");
    }

    ImageFileWriter::new().write(&args.output, &scrubbed.frame, None)?;
    log::info!(
        "Frame {index}/{total} of {} written to {}",
        target.display(),
        args.output.display()
    );
    Ok(())
}

fn run_map(cli: &Cli, args: &MapArgs) -> Result<(), Box<dyn std::error::Error>> {
    let analyser = build_analyser(cli)?;
    let reader = DefaultReaderFactory.reader_for(&args.target);

    let progress: Box<dyn Fn(usize, usize) -> bool + Send> = Box::new(|current, total| {
        eprint!("\rScanning frame {current}/{total}");
        true
    });
    let mut use_case = TargetFacesUseCase::new(reader, analyser, args.stride, Some(progress));
    let crops = use_case.execute(&args.target)?;
    eprintln!();

    let paths = write_thumbnails(&crops, &ImageFileWriter::new(), &args.output_dir)?;
    let registry = FaceMapRegistry::from_targets(crops);
    log::info!(
        "Found {} distinct face(s); thumbnails in {}",
        registry.len(),
        args.output_dir.display()
    );
    for (entry, path) in registry.entries().iter().zip(paths) {
        println!("{}: {}", entry.id, path.display());
    }
    Ok(())
}

fn run_cameras() {
    let cameras = FfmpegCameraProvider::new().list_cameras();
    if cameras.is_empty() {
        println!("No cameras found");
    }
    for camera in cameras {
        println!("{}: {}", camera.index, camera.name);
    }
}

fn run_live(
    cli: &Cli,
    config: &ConfigSnapshot,
    args: &LiveArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    warn_if_ungated(config);
    let analyser = build_analyser(cli)?;
    let readers: Arc<dyn ReaderFactory> = Arc::new(DefaultReaderFactory);

    let mut renderer = ImageFileRenderer::new(Box::new(ImageFileWriter::new()), &args.output);
    if let Some((w, h)) = args.fit {
        renderer = renderer.with_display_size(w, h);
    }

    let chain = build_chain(config, analyser.clone(), failure_policy(&args.chain));
    let mut session = CaptureSession::new(
        Arc::new(FfmpegCameraProvider::new()),
        Box::new(renderer),
        chain,
        analyser.clone(),
        readers.clone(),
        Arc::new(config.clone()),
    )
    .with_logger(Box::new(StdoutPipelineLogger::default()));

    if !args.pair.is_empty() {
        let map = build_face_map(&args.pair, readers.as_ref(), analyser.as_ref())?;
        session = session.with_face_map(map);
    }
    if let Some(frames) = args.frames {
        session = session.with_frame_limit(frames);
    }

    let (events, stop) = capture_worker::spawn(session, args.camera);
    ctrlc::set_handler(move || {
        log::info!("Stopping capture...");
        stop.store(true, Ordering::Relaxed);
    })?;

    // Ctrl-C only raises the stop flag; the worker closes the camera and
    // then reports Finished.
    for event in events {
        match event {
            CaptureEvent::Started => log::info!("Live output: {}", args.output.display()),
            CaptureEvent::Fps(fps) => log::debug!("{fps:.1} fps"),
            CaptureEvent::FrameDropped(reason) => log::debug!("Dropped frame: {reason}"),
            CaptureEvent::Warning(message) => eprintln!("Warning: {message}"),
            CaptureEvent::Finished(report) => {
                log::info!(
                    "Rendered {} frames ({} dropped), last {:.1} fps",
                    report.frames_rendered,
                    report.frames_dropped,
                    report.last_fps
                );
                return Ok(());
            }
            CaptureEvent::Error(message) => return Err(message.into()),
        }
    }
    Err("capture thread ended unexpectedly".into())
}

/// One entry per `target=source` pair.
fn build_face_map(
    pairs: &[(PathBuf, PathBuf)],
    readers: &dyn ReaderFactory,
    analyser: &dyn FaceAnalyser,
) -> Result<SharedFaceMap, Box<dyn std::error::Error>> {
    let mut registry = FaceMapRegistry::new();
    for (target, source) in pairs {
        let id = registry.add_blank_entry();
        registry.set_target(id, &decode_image(readers, target)?, analyser)?;
        registry.set_source(id, &decode_image(readers, source)?, analyser)?;
    }
    registry.require_valid()?;
    Ok(registry.shared())
}

fn decode_image(
    readers: &dyn ReaderFactory,
    path: &Path,
) -> Result<Frame, Box<dyn std::error::Error>> {
    let (_, frame) = read_frame_at(readers, path, 0)?;
    frame.ok_or_else(|| format!("{} has no frames", path.display()).into())
}

fn build_analyser(cli: &Cli) -> Result<Arc<dyn FaceAnalyser>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        YOLO_MODEL_NAME,
        YOLO_MODEL_URL,
        None,
        Some(Box::new(download_progress)),
    )?;
    eprintln!();
    let mut analyser = OnnxFaceAnalyser::new(&model_path, cli.confidence)?;

    if !cli.no_embedding {
        log::info!("Resolving model: {EMBEDDING_MODEL_NAME}");
        let embedding_path = model_resolver::resolve(
            EMBEDDING_MODEL_NAME,
            EMBEDDING_MODEL_URL,
            None,
            Some(Box::new(download_progress)),
        )?;
        eprintln!();
        analyser = analyser.with_embedder(ArcFaceEmbedder::new(&embedding_path)?);
    }
    Ok(Arc::new(analyser))
}

/// The snapshot one live run uses. Mapped mode and the source image come
/// from this invocation only, so they never reach the settings file.
fn live_config(config: &ConfigSnapshot, args: &LiveArgs) -> ConfigSnapshot {
    ConfigSnapshot {
        map_faces: !args.pair.is_empty(),
        source_path: args.source.clone(),
        ..config.clone()
    }
}

fn apply_chain_args(config: &mut ConfigSnapshot, args: &ChainArgs) {
    config.many_faces |= args.many_faces;
    if args.enhance {
        config
            .module_flags
            .insert(FACE_ENHANCER_FLAG.to_string(), true);
    }
    if let Some(opacity) = args.opacity {
        config.face_opacity = opacity;
    }
}

fn failure_policy(args: &ChainArgs) -> FailurePolicy {
    if args.skip_failed {
        FailurePolicy::Skip
    } else {
        FailurePolicy::Abort
    }
}

/// No classifier ships with the CLI.
fn warn_if_ungated(config: &ConfigSnapshot) {
    if config.nsfw_filter {
        log::warn!(
            "nsfw_filter is on but no content classifier is available; frames are not gated"
        );
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    let chain = match &cli.command {
        Command::Preview(args) => {
            if !args.target.exists() {
                return Err(format!("Target not found: {}", args.target.display()).into());
            }
            Some(&args.chain)
        }
        Command::Map(args) => {
            if !args.target.exists() {
                return Err(format!("Target not found: {}", args.target.display()).into());
            }
            if args.stride == 0 {
                return Err("Stride must be at least 1".into());
            }
            None
        }
        Command::Cameras => None,
        Command::Live(args) => {
            if args.source.is_some() && !args.pair.is_empty() {
                return Err("--source and --pair are mutually exclusive".into());
            }
            Some(&args.chain)
        }
    };
    if let Some(opacity) = chain.and_then(|c| c.opacity) {
        if opacity > 100 {
            return Err(format!("Opacity must be between 0 and 100, got {opacity}").into());
        }
    }
    Ok(())
}

fn parse_pair(value: &str) -> Result<(PathBuf, PathBuf), String> {
    let (target, source) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TARGET=SOURCE, got '{value}'"))?;
    if target.is_empty() || source.is_empty() {
        return Err(format!("expected TARGET=SOURCE, got '{value}'"));
    }
    Ok((PathBuf::from(target), PathBuf::from(source)))
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let parse = || -> Option<(u32, u32)> {
        let (w, h) = value.split_once(['x', 'X'])?;
        let size = (w.parse().ok()?, h.parse().ok()?);
        (size.0 > 0 && size.1 > 0).then_some(size)
    };
    parse().ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face model... {pct}%");
    } else {
        eprint!("\rDownloading face model... {downloaded} bytes");
    }
}
