//! Capture loop: read frames, process, display and optionally record them.

pub mod ffmpeg;
#[cfg(feature = "opencv")]
pub mod opencv;

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{CaptureSource, Downsample};
use crate::process::{self, Passthrough, Processor};

pub use ffmpeg::FfmpegBackend;
#[cfg(feature = "opencv")]
pub use self::opencv::OpenCvBackend;

/// Key code that stops the loop
pub const KEY_ESCAPE: i32 = 27;

/// Frame rate of recorded output
pub const OUTPUT_FPS: f64 = 10.0;

/// Delay passed to the key poll after each frame, in milliseconds
const KEY_POLL_MS: i32 = 1;

/// Source of frames (camera or video file)
pub trait FrameSource {
    /// Read the next frame; `None` once the source is exhausted
    fn read(&mut self) -> Result<Option<RgbImage>>;

    /// Release the underlying device. Must be safe to call more than once.
    fn release(&mut self) {}
}

/// Window frames are shown in
pub trait FrameDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<()>;

    /// Wait up to `delay_ms` for a key press
    fn poll_key(&mut self, delay_ms: i32) -> Result<Option<i32>>;

    /// Whether `poll_key` can ever report a key
    fn reports_keys(&self) -> bool {
        true
    }

    /// Close the window. Must be safe to call more than once.
    fn close(&mut self) {}
}

/// Encoder for recorded output
pub trait VideoWriter {
    fn write(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and close the output. Must be safe to call more than once.
    fn finish(&mut self) -> Result<()>;
}

/// Factory for the sources, displays and writers used by the capture loop
pub trait CaptureBackend {
    fn name(&self) -> &str;

    fn open_source(&self, source: &CaptureSource) -> Result<Box<dyn FrameSource>>;

    fn open_display(&self, title: &str) -> Result<Box<dyn FrameDisplay>>;

    /// Open an MJPG writer for frames of `size` (width, height)
    fn open_writer(&self, path: &Path, size: (u32, u32), fps: f64) -> Result<Box<dyn VideoWriter>>;
}

/// Backend used when none is chosen explicitly
pub fn default_backend() -> Box<dyn CaptureBackend> {
    #[cfg(feature = "opencv")]
    {
        Box::new(OpenCvBackend::new())
    }
    #[cfg(not(feature = "opencv"))]
    {
        Box::new(FfmpegBackend::new())
    }
}

/// Display without a window: frames are only logged and no key is ever pressed
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    title: String,
    frames_shown: u64,
}

impl HeadlessDisplay {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            frames_shown: 0,
        }
    }
}

impl FrameDisplay for HeadlessDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<()> {
        self.frames_shown += 1;
        debug!(
            "{}: frame {} ({}x{})",
            self.title,
            self.frames_shown,
            frame.width(),
            frame.height()
        );
        Ok(())
    }

    fn poll_key(&mut self, _delay_ms: i32) -> Result<Option<i32>> {
        Ok(None)
    }

    fn reports_keys(&self) -> bool {
        false
    }
}

/// Counters reported after a capture run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub frames_read: u64,
    pub frames_written: u64,
    pub stopped_by_key: bool,
}

/// Resources owned by one capture run, released on every exit path
struct CaptureSession {
    source: Box<dyn FrameSource>,
    display: Box<dyn FrameDisplay>,
    writer: Option<Box<dyn VideoWriter>>,
}

impl CaptureSession {
    fn close(&mut self) -> Result<()> {
        self.source.release();
        let finished = match self.writer.take() {
            Some(mut writer) => writer.finish(),
            None => Ok(()),
        };
        self.display.close();
        finished
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("Failed to finalize output video: {}", err);
        }
    }
}

/// Runs a processor over every frame of a capture source
pub struct CaptureRunner<'a> {
    backend: &'a dyn CaptureBackend,
    title: String,
    output: Option<PathBuf>,
    down: Downsample,
    fps: f64,
}

impl<'a> CaptureRunner<'a> {
    pub fn new(backend: &'a dyn CaptureBackend, title: impl Into<String>) -> Self {
        Self {
            backend,
            title: title.into(),
            output: None,
            down: Downsample::default(),
            fps: OUTPUT_FPS,
        }
    }

    /// Record displayed frames to this file
    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Shrink frames before processing
    pub fn with_downsample(mut self, down: Downsample) -> Self {
        self.down = down;
        self
    }

    /// Display (and optionally record) a source without processing
    pub fn preview(&self, source: &CaptureSource) -> Result<CaptureSummary> {
        self.run::<Passthrough>(source, None)
    }

    /// Run the loop until the escape key is pressed or the source is exhausted
    pub fn run<P: Processor>(
        &self,
        source: &CaptureSource,
        mut stage: Option<(&mut P, &P::Config)>,
    ) -> Result<CaptureSummary> {
        let mut session = CaptureSession {
            source: self.backend.open_source(source)?,
            display: self.backend.open_display(&self.title)?,
            writer: None,
        };

        info!("Reading from {} ({} backend)", source, self.backend.name());
        if session.display.reports_keys() {
            info!("Hit the 'esc' key to exit");
        } else {
            debug!("{} has no key input; running until the source ends", self.title);
        }

        let mut summary = CaptureSummary::default();

        loop {
            let frame = match session.source.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!("{} exhausted", source);
                    break;
                }
                Err(err) => {
                    warn!("Failed to read frame from {}: {}", source, err);
                    break;
                }
            };
            summary.frames_read += 1;

            let halvings = self.down.halvings_for(frame.width(), frame.height());
            let frame = crate::filters::downsample(frame, halvings);

            let frame = match stage.as_mut() {
                Some((processor, config)) => process::render(&mut **processor, frame, *config)?,
                None => frame,
            };

            session.display.show(&frame)?;

            if let Some(path) = &self.output {
                if session.writer.is_none() {
                    info!(
                        "Recording {}x{} at {} fps to {}",
                        frame.width(),
                        frame.height(),
                        self.fps,
                        path.display()
                    );
                    session.writer = Some(self.backend.open_writer(path, frame.dimensions(), self.fps)?);
                }
                if let Some(writer) = session.writer.as_mut() {
                    writer.write(&frame)?;
                    summary.frames_written += 1;
                }
            }

            if session.display.poll_key(KEY_POLL_MS)? == Some(KEY_ESCAPE) {
                summary.stopped_by_key = true;
                break;
            }
        }

        session.close()?;
        info!(
            "Capture finished: {} frames read, {} written",
            summary.frames_read, summary.frames_written
        );
        Ok(summary)
    }
}
