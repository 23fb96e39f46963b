use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use imagelab::{
    CaptureBackend, CaptureRunner, CaptureSource, CartoonConfig, Cartoonify, DispatchRequest,
    Dispatcher, Downsample, FfmpegBackend, LabError, Processor, default_backend,
};

#[derive(Parser)]
#[command(name = "imagelab")]
#[command(about = "Cartoonify, detect faces and extract foregrounds from images, videos and cameras")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend for reading, showing and recording video
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendKind {
    /// ffmpeg/ffprobe child processes, no preview window
    Ffmpeg,
    /// OpenCV videoio and highgui (requires the `opencv` feature)
    Opencv,
}

#[derive(Subcommand)]
enum Command {
    /// Make images look like cartoons
    Cartoon {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        params: CartoonArgs,
    },

    /// Detect faces with OpenCV (`opencv` feature) or dlib (`dlib` feature)
    Faces {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        params: FaceArgs,
    },

    /// Extract the foreground with GrabCut (requires the `opencv` feature)
    Foreground {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        params: ForegroundArgs,
    },

    /// Show a camera or video without processing, optionally recording it
    Preview {
        /// Video file to replay instead of the camera
        #[arg(long, value_name = "VIDEO")]
        input: Option<PathBuf>,

        /// Record the frames to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Camera index
        #[arg(long, default_value_t = 0)]
        camera: i32,

        /// Replace an existing recording
        #[arg(long)]
        overwrite: bool,
    },
}

/// Input/output options shared by every processing command
#[derive(Args)]
struct IoArgs {
    /// Input image, video or directory; the camera is used when omitted
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output file, or output directory when the input is a directory
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of times to halve the input before processing
    #[arg(long, default_value_t = 1)]
    down: u32,

    /// Halve the input until it fits in WIDTHxHEIGHT (overrides --down)
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    fit: Option<FitSize>,

    /// Camera index used when no input is given
    #[arg(long, default_value_t = 0)]
    camera: i32,

    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,
}

impl IoArgs {
    fn request(&self, title: &str) -> DispatchRequest {
        let down = match self.fit {
            Some(FitSize { width, height }) => Downsample::Fit {
                max_width: width,
                max_height: height,
            },
            None => Downsample::Factor(self.down),
        };

        let mut request = DispatchRequest::new(title, self.input.clone().unwrap_or_default())
            .with_camera(self.camera)
            .with_downsample(down)
            .with_overwrite(self.overwrite);
        if let Some(output) = &self.output {
            request = request.with_output(output);
        }
        request
    }
}

#[derive(Clone, Copy)]
struct FitSize {
    width: u32,
    height: u32,
}

impl FromStr for FitSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", s))?;
        let width = w.trim().parse().map_err(|e| format!("bad width {:?}: {}", w, e))?;
        let height = h.trim().parse().map_err(|e| format!("bad height {:?}: {}", h, e))?;
        Ok(Self { width, height })
    }
}

#[derive(Args)]
struct CartoonArgs {
    /// Number of stages of bilateral filter
    #[arg(long, default_value_t = 7)]
    bi_stages: u32,

    /// Diameter of bilateral filter
    #[arg(long, default_value_t = 9)]
    bi_diameter: u32,

    /// Bilateral filter sigma color
    #[arg(long, default_value_t = 9.0)]
    bi_sigma_color: f32,

    /// Bilateral filter sigma space
    #[arg(long, default_value_t = 7.0)]
    bi_sigma_space: f32,

    /// Median blur kernel size (odd)
    #[arg(long, default_value_t = 9)]
    blur_kernel_size: u32,

    /// Adaptive threshold block size (odd)
    #[arg(long, default_value_t = 9)]
    adapt_thresh_block: u32,

    /// Adaptive threshold constant
    #[arg(long, default_value_t = 2, allow_hyphen_values = true)]
    adapt_thresh_const: i32,
}

impl From<&CartoonArgs> for CartoonConfig {
    fn from(args: &CartoonArgs) -> Self {
        CartoonConfig {
            bilateral_stages: args.bi_stages,
            bilateral_diameter: args.bi_diameter,
            bilateral_sigma_color: args.bi_sigma_color,
            bilateral_sigma_space: args.bi_sigma_space,
            blur_kernel_size: args.blur_kernel_size,
            adaptive_thresh_block: args.adapt_thresh_block,
            adaptive_thresh_const: args.adapt_thresh_const,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FaceEngine {
    /// Haar cascade, or YuNet when --model is given
    Opencv,
    /// dlib HOG, or dlib's CNN when --model is given
    Dlib,
}

#[derive(Args)]
#[cfg_attr(not(all(feature = "opencv", feature = "dlib")), allow(dead_code))]
struct FaceArgs {
    /// Detection library
    #[arg(long, value_enum, default_value_t = FaceEngine::Opencv)]
    engine: FaceEngine,

    /// Haar cascade XML (defaults to OpenCV's frontal face cascade)
    #[arg(long, value_name = "XML")]
    cascade: Option<PathBuf>,

    /// CNN face model (ONNX for opencv, .dat for dlib); selects the CNN detector when given
    #[arg(long, value_name = "MODEL")]
    model: Option<PathBuf>,

    /// Cascade pyramid scale step
    #[arg(long, default_value_t = 1.1)]
    scale_factor: f64,

    /// Neighbouring hits a cascade candidate needs
    #[arg(long, default_value_t = 3)]
    min_neighbors: i32,

    /// Smallest face side in pixels
    #[arg(long, default_value_t = 0)]
    min_size: u32,

    /// Skip histogram equalization before detection
    #[arg(long)]
    no_equalize: bool,

    /// Times dlib doubles the image before detection
    #[arg(long, default_value_t = 1)]
    upsample: u32,

    /// Minimum CNN face confidence
    #[arg(long, default_value_t = 0.9)]
    score_threshold: f32,
}

#[derive(Args)]
#[cfg_attr(not(feature = "opencv"), allow(dead_code))]
struct ForegroundArgs {
    /// GrabCut iterations
    #[arg(long, default_value_t = 5)]
    iterations: u32,

    /// Initial foreground box as x,y,width,height (default: centered half)
    #[arg(long, value_name = "X,Y,W,H")]
    rect: Option<RectArg>,
}

#[derive(Clone, Copy)]
#[cfg_attr(not(feature = "opencv"), allow(dead_code))]
struct RectArg {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl FromStr for RectArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, w, h] = parts.as_slice() else {
            return Err(format!("expected X,Y,W,H, got {:?}", s));
        };
        let bad = |e: std::num::ParseIntError| format!("bad rectangle {:?}: {}", s, e);
        Ok(Self {
            x: x.parse().map_err(bad)?,
            y: y.parse().map_err(bad)?,
            width: w.parse().map_err(bad)?,
            height: h.parse().map_err(bad)?,
        })
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let backend = select_backend(args.backend)?;

    match args.command {
        Command::Cartoon { io, params } => {
            let config = CartoonConfig::from(&params).checked()?;
            run(backend.as_ref(), &mut Cartoonify, &config, "Cartoonify", &io)
        }
        Command::Faces { io, params } => run_faces(backend.as_ref(), &io, &params),
        Command::Foreground { io, params } => run_foreground(backend.as_ref(), &io, &params),
        Command::Preview {
            input,
            output,
            camera,
            overwrite,
        } => {
            if let Some(output) = &output {
                if output.exists() && !overwrite {
                    return Err(LabError::Conflict(output.clone()).into());
                }
            }
            let source = match input {
                Some(path) => CaptureSource::File(path),
                None => CaptureSource::Camera(camera),
            };
            let summary = CaptureRunner::new(backend.as_ref(), "Preview")
                .with_output(output)
                .preview(&source)
                .with_context(|| format!("Preview of {} failed", source))?;
            println!(
                "Frames shown: {}, recorded: {}",
                summary.frames_read, summary.frames_written
            );
            Ok(())
        }
    }
}

/// Log to stderr; RUST_LOG overrides the level picked by --verbose
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn select_backend(kind: Option<BackendKind>) -> anyhow::Result<Box<dyn CaptureBackend>> {
    match kind {
        None => Ok(default_backend()),
        Some(BackendKind::Ffmpeg) => Ok(Box::new(FfmpegBackend::new())),
        Some(BackendKind::Opencv) => opencv_backend(),
    }
}

#[cfg(feature = "opencv")]
fn opencv_backend() -> anyhow::Result<Box<dyn CaptureBackend>> {
    Ok(Box::new(imagelab::OpenCvBackend::new()))
}

#[cfg(not(feature = "opencv"))]
fn opencv_backend() -> anyhow::Result<Box<dyn CaptureBackend>> {
    anyhow::bail!("imagelab was built without the `opencv` feature")
}

fn run<P: Processor>(
    backend: &dyn CaptureBackend,
    processor: &mut P,
    config: &P::Config,
    title: &str,
    io: &IoArgs,
) -> anyhow::Result<()> {
    let request = io.request(title);
    let report = Dispatcher::new(backend)
        .run(processor, config, &request)
        .with_context(|| format!("{} failed on {}", title, request.input.display()))?;

    println!("=== {} ({} mode) ===", title, report.mode);
    for path in &report.written {
        println!("  wrote   {}", path.display());
    }
    for path in &report.skipped {
        println!("  skipped {} (exists)", path.display());
    }
    Ok(())
}

fn run_faces(backend: &dyn CaptureBackend, io: &IoArgs, args: &FaceArgs) -> anyhow::Result<()> {
    match args.engine {
        FaceEngine::Opencv => run_opencv_faces(backend, io, args),
        FaceEngine::Dlib => run_dlib_faces(backend, io, args),
    }
}

#[cfg(feature = "opencv")]
fn run_opencv_faces(
    backend: &dyn CaptureBackend,
    io: &IoArgs,
    args: &FaceArgs,
) -> anyhow::Result<()> {
    use imagelab::process::{CascadeConfig, CascadeFaceDetector, CnnConfig, CnnFaceDetector};

    if let Some(model) = &args.model {
        let mut detector = CnnFaceDetector::new(model)?;
        let config = CnnConfig {
            score_threshold: args.score_threshold,
            ..CnnConfig::default()
        }
        .checked()?;
        return run(backend, &mut detector, &config, "Face Detection", io);
    }

    let mut detector = match &args.cascade {
        Some(path) => CascadeFaceDetector::new(path)?,
        None => CascadeFaceDetector::with_default_cascade()
            .context("No cascade found; pass --cascade or set OPENCV_HAARCASCADES")?,
    };
    let config = CascadeConfig {
        scale_factor: args.scale_factor,
        min_neighbors: args.min_neighbors,
        min_size: args.min_size,
        equalize: !args.no_equalize,
    }
    .checked()?;
    run(backend, &mut detector, &config, "Face Detection", io)
}

#[cfg(not(feature = "opencv"))]
fn run_opencv_faces(
    _backend: &dyn CaptureBackend,
    _io: &IoArgs,
    _args: &FaceArgs,
) -> anyhow::Result<()> {
    anyhow::bail!("face detection needs imagelab built with the `opencv` feature")
}

#[cfg(feature = "dlib")]
fn run_dlib_faces(
    backend: &dyn CaptureBackend,
    io: &IoArgs,
    args: &FaceArgs,
) -> anyhow::Result<()> {
    use imagelab::process::{DlibConfig, DlibFaceDetector};

    let mut detector = DlibFaceDetector::from_model(args.model.as_deref())?;
    let config = DlibConfig {
        upsample: args.upsample,
        equalize: !args.no_equalize,
    }
    .checked()?;
    run(backend, &mut detector, &config, "Face Detection", io)
}

#[cfg(not(feature = "dlib"))]
fn run_dlib_faces(
    _backend: &dyn CaptureBackend,
    _io: &IoArgs,
    _args: &FaceArgs,
) -> anyhow::Result<()> {
    anyhow::bail!("dlib face detection needs imagelab built with the `dlib` feature")
}

#[cfg(feature = "opencv")]
fn run_foreground(
    backend: &dyn CaptureBackend,
    io: &IoArgs,
    args: &ForegroundArgs,
) -> anyhow::Result<()> {
    use imagelab::Detection;
    use imagelab::process::{Foreground, ForegroundConfig};

    let rect = match args.rect {
        Some(r) => Some(
            Detection::new(r.x, r.y, r.width, r.height)
                .context("--rect needs a non-empty width and height")?,
        ),
        None => None,
    };
    let config = ForegroundConfig {
        rect,
        iterations: args.iterations,
    }
    .checked()?;
    run(backend, &mut Foreground::new(), &config, "GrabCut", io)
}

#[cfg(not(feature = "opencv"))]
fn run_foreground(
    _backend: &dyn CaptureBackend,
    _io: &IoArgs,
    _args: &ForegroundArgs,
) -> anyhow::Result<()> {
    anyhow::bail!("foreground extraction needs imagelab built with the `opencv` feature")
}
