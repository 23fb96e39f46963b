//! Route a processor over a single image, a video, the camera or a directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::capture::{CaptureBackend, CaptureRunner, CaptureSummary};
use crate::error::{LabError, Result};
use crate::filters;
use crate::media::MediaTypes;
use crate::models::{CaptureSource, Downsample, MediaKind, Mode};
use crate::process::{self, ImageInput, Processor};

/// What to run and where to write it
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Window title for video and camera modes
    pub title: String,
    /// Input file or directory; empty means the camera
    pub input: PathBuf,
    /// Output file, or output directory in directory mode
    pub output: Option<PathBuf>,
    /// Camera index used in camera mode
    pub camera: i32,
    pub down: Downsample,
    /// Replace existing outputs
    pub overwrite: bool,
}

impl DispatchRequest {
    pub fn new(title: impl Into<String>, input: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            input: input.into(),
            output: None,
            camera: 0,
            down: Downsample::default(),
            overwrite: false,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_camera(mut self, camera: i32) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_downsample(mut self, down: Downsample) -> Self {
        self.down = down;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Outcome of a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub mode: Mode,
    /// Output files produced
    pub written: Vec<PathBuf>,
    /// Outputs that already existed and were left untouched (directory mode)
    pub skipped: Vec<PathBuf>,
    /// Inputs that were not images or videos (directory mode)
    pub ignored: Vec<PathBuf>,
}

impl DispatchReport {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            written: Vec::new(),
            skipped: Vec::new(),
            ignored: Vec::new(),
        }
    }
}

/// Directory that mirrored outputs are written into.
///
/// An existing directory, a path ending in a separator, or a path without an
/// extension is used as is; otherwise the file name is dropped
/// (`out/cartoon.png` writes into `out/`).
pub fn output_directory(output: &Path) -> PathBuf {
    let text = output.to_string_lossy();
    let ends_with_separator = text.ends_with('/') || text.ends_with(std::path::MAIN_SEPARATOR);

    if output.is_dir() || ends_with_separator || output.extension().is_none() {
        return output.to_path_buf();
    }

    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn create_parent_dir(output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Selects a mode per input and runs the processor accordingly
pub struct Dispatcher<'a> {
    backend: &'a dyn CaptureBackend,
    media: &'a MediaTypes,
}

impl<'a> Dispatcher<'a> {
    pub fn new(backend: &'a dyn CaptureBackend) -> Self {
        Self {
            backend,
            media: MediaTypes::global(),
        }
    }

    /// Use a specific media type registry instead of the process-wide one
    pub fn with_media_types(mut self, media: &'a MediaTypes) -> Self {
        self.media = media;
        self
    }

    /// Decide the mode for an input path
    pub fn detect_mode(&self, input: &Path) -> Result<Mode> {
        if input.as_os_str().is_empty() {
            return Ok(Mode::Camera);
        }

        if input.is_file() {
            return match self.media.classify(input)? {
                Some(kind) => Ok(kind.into()),
                None => Err(LabError::InvalidInput(format!(
                    "{} is neither an image nor a video",
                    input.display()
                ))),
            };
        }

        if input.is_dir() {
            return Ok(Mode::Directory);
        }

        Err(LabError::InvalidInput(format!(
            "{} is neither a file nor a directory",
            input.display()
        )))
    }

    /// Run `processor` over the request's input
    pub fn run<P: Processor>(
        &self,
        processor: &mut P,
        config: &P::Config,
        request: &DispatchRequest,
    ) -> Result<DispatchReport> {
        let mode = self.detect_mode(&request.input)?;
        info!("{}: {} mode", request.title, mode);

        // Single-file modes refuse to clobber; directory mode skips per file instead
        if mode != Mode::Directory && !request.overwrite {
            if let Some(output) = &request.output {
                if output.exists() {
                    return Err(LabError::Conflict(output.clone()));
                }
            }
        }

        let mut report = DispatchReport::new(mode);

        match mode {
            Mode::Image => {
                let output = request.output.as_deref().ok_or_else(|| {
                    LabError::InvalidInput("an output path is required for image input".into())
                })?;
                self.process_image(processor, config, &request.input, output, request.down)?;
                report.written.push(output.to_path_buf());
            }
            Mode::Video => {
                let source = CaptureSource::File(request.input.clone());
                let summary =
                    self.process_stream(processor, config, request, &source, request.output.clone())?;
                if summary.frames_written > 0 {
                    report.written.extend(request.output.clone());
                }
            }
            Mode::Camera => {
                let source = CaptureSource::Camera(request.camera);
                let summary =
                    self.process_stream(processor, config, request, &source, request.output.clone())?;
                if summary.frames_written > 0 {
                    report.written.extend(request.output.clone());
                }
            }
            Mode::Directory => {
                self.process_directory(processor, config, request, &mut report)?;
            }
        }

        Ok(report)
    }

    /// Load, downsample, process, draw detections and save one image
    fn process_image<P: Processor>(
        &self,
        processor: &mut P,
        config: &P::Config,
        input: &Path,
        output: &Path,
        down: Downsample,
    ) -> Result<()> {
        let image = ImageInput::Path(input.to_path_buf()).load()?;
        let halvings = down.halvings_for(image.width(), image.height());
        let image = filters::downsample(image, halvings);
        debug!(
            "Processing {} at {}x{} ({} halvings)",
            input.display(),
            image.width(),
            image.height(),
            halvings
        );

        let rendered = process::render(processor, image, config)?;

        create_parent_dir(output)?;
        rendered.save(output)?;
        info!("Wrote {}", output.display());
        Ok(())
    }

    fn process_stream<P: Processor>(
        &self,
        processor: &mut P,
        config: &P::Config,
        request: &DispatchRequest,
        source: &CaptureSource,
        output: Option<PathBuf>,
    ) -> Result<CaptureSummary> {
        if let Some(output) = &output {
            create_parent_dir(output)?;
        }
        CaptureRunner::new(self.backend, request.title.clone())
            .with_output(output)
            .with_downsample(request.down)
            .run(source, Some((processor, config)))
    }

    fn process_directory<P: Processor>(
        &self,
        processor: &mut P,
        config: &P::Config,
        request: &DispatchRequest,
        report: &mut DispatchReport,
    ) -> Result<()> {
        let output = request.output.as_deref().ok_or_else(|| {
            LabError::InvalidInput("an output directory is required for directory input".into())
        })?;
        let out_dir = output_directory(output);
        fs::create_dir_all(&out_dir)?;

        let mut entries = fs::read_dir(&request.input)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            if !path.is_file() {
                debug!("Ignoring {} (not a file)", path.display());
                report.ignored.push(path);
                continue;
            }

            let Some(kind) = self.media.classify(&path)? else {
                debug!("Ignoring {} (not an image or video)", path.display());
                report.ignored.push(path);
                continue;
            };

            let Some(file_name) = path.file_name() else {
                continue;
            };
            let out_file = out_dir.join(file_name);

            if out_file.exists() && !request.overwrite {
                warn!("File ({}) exists...skipping", out_file.display());
                report.skipped.push(out_file);
                continue;
            }

            match kind {
                MediaKind::Image => {
                    self.process_image(processor, config, &path, &out_file, request.down)?;
                    report.written.push(out_file);
                }
                MediaKind::Video => {
                    let source = CaptureSource::File(path.clone());
                    let summary = self.process_stream(
                        processor,
                        config,
                        request,
                        &source,
                        Some(out_file.clone()),
                    )?;
                    if summary.frames_written > 0 {
                        report.written.push(out_file);
                    }
                }
            }
        }

        info!(
            "Directory done: {} written, {} skipped, {} ignored",
            report.written.len(),
            report.skipped.len(),
            report.ignored.len()
        );
        Ok(())
    }
}
