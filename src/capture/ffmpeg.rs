//! Capture backend built on the `ffmpeg` and `ffprobe` executables.
//!
//! Sources are decoded to raw `rgb24` frames streamed over the child's
//! stdout; writers stream raw frames into an `ffmpeg` child encoding MJPG.

use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use image::RgbImage;
use image::imageops::{self, FilterType};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{CaptureBackend, FrameDisplay, FrameSource, HeadlessDisplay, VideoWriter};
use crate::error::{LabError, Result};
use crate::models::CaptureSource;

/// ffprobe JSON output (only the fields we need)
#[derive(Debug, Deserialize)]
struct StreamListing {
    #[serde(default)]
    streams: Vec<StreamInfo>,
}

#[derive(Debug, Deserialize)]
struct StreamInfo {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
}

fn locate(tool: &str) -> Result<PathBuf> {
    which::which(tool).map_err(|_| LabError::FfmpegNotFound)
}

fn camera_device(index: i32) -> String {
    format!("/dev/video{}", index)
}

/// Input arguments selecting the source (video4linux2 for cameras).
///
/// Files are decoded without autorotation so frames keep the stored size
/// reported by ffprobe.
fn input_args(source: &CaptureSource) -> Vec<String> {
    match source {
        CaptureSource::Camera(index) => vec![
            "-f".to_string(),
            "video4linux2".to_string(),
            "-i".to_string(),
            camera_device(*index),
        ],
        CaptureSource::File(path) => vec![
            "-noautorotate".to_string(),
            "-i".to_string(),
            path.to_string_lossy().into_owned(),
        ],
    }
}

/// Size of the first video stream with known, non-zero dimensions
fn frame_size(listing: &StreamListing) -> Option<(u32, u32)> {
    listing
        .streams
        .iter()
        .filter(|s| s.codec_type == "video")
        .find_map(|s| match (s.width, s.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Some((width, height)),
            _ => None,
        })
}

/// Frame size of the first video stream, as reported by ffprobe
fn source_size(ffprobe: &Path, source: &CaptureSource) -> Result<(u32, u32)> {
    let open_error = || LabError::Open {
        uri: source.to_string(),
    };

    let mut cmd = Command::new(ffprobe);
    cmd.args([
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_streams",
        "-select_streams",
        "v:0",
    ]);
    match source {
        CaptureSource::Camera(index) => {
            cmd.args(["-f", "video4linux2"]).arg(camera_device(*index));
        }
        CaptureSource::File(path) => {
            cmd.arg(path);
        }
    }

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        debug!(
            "ffprobe failed on {}: {}",
            source,
            String::from_utf8_lossy(&output.stderr)
        );
        return Err(open_error());
    }

    let listing: StreamListing = serde_json::from_slice(&output.stdout)?;
    frame_size(&listing).ok_or_else(open_error)
}

/// Capture backend driving `ffmpeg` child processes with a headless display
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open_source(&self, source: &CaptureSource) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegSource::open(source)?))
    }

    fn open_display(&self, title: &str) -> Result<Box<dyn FrameDisplay>> {
        Ok(Box::new(HeadlessDisplay::new(title)))
    }

    fn open_writer(&self, path: &Path, size: (u32, u32), fps: f64) -> Result<Box<dyn VideoWriter>> {
        Ok(Box::new(FfmpegWriter::create(path, size, fps)?))
    }
}

/// Frames decoded by an `ffmpeg` child process
pub struct FfmpegSource {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl FfmpegSource {
    pub fn open(source: &CaptureSource) -> Result<Self> {
        let ffprobe = locate("ffprobe")?;
        let ffmpeg = locate("ffmpeg")?;
        let (width, height) = source_size(&ffprobe, source)?;

        let mut cmd = Command::new(ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error"])
            .args(input_args(source))
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|_| LabError::Open {
            uri: source.to_string(),
        })?;
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                return Err(LabError::ffmpeg("failed to capture ffmpeg stdout", None));
            }
        };

        debug!("Decoding {} at {}x{}", source, width, height);
        Ok(Self {
            child,
            stdout,
            width,
            height,
            buffer: vec![0u8; width as usize * height as usize * 3],
        })
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FrameSource for FfmpegSource {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        match self.stdout.read_exact(&mut self.buffer) {
            Ok(()) => Ok(RgbImage::from_raw(self.width, self.height, self.buffer.clone())),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn release(&mut self) {
        // Already-exited children make kill fail, which is fine
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Arguments for an MJPG encoder reading raw `rgb24` frames from stdin
fn writer_args(path: &Path, size: (u32, u32), fps: f64) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner", "-loglevel", "error", "-y", "-f", "rawvideo", "-pix_fmt", "rgb24",
    ]
    .iter()
    .map(|a| a.to_string())
    .collect();
    args.extend([
        "-s".to_string(),
        format!("{}x{}", size.0, size.1),
        "-r".to_string(),
        format!("{}", fps),
    ]);
    args.extend(
        ["-i", "-", "-an", "-c:v", "mjpeg", "-q:v", "3"]
            .iter()
            .map(|a| a.to_string()),
    );
    args.push(path.to_string_lossy().into_owned());
    args
}

/// MJPG encoder fed through an `ffmpeg` child's stdin
pub struct FfmpegWriter {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    size: (u32, u32),
    path: PathBuf,
}

impl FfmpegWriter {
    pub fn create(path: &Path, size: (u32, u32), fps: f64) -> Result<Self> {
        let ffmpeg = locate("ffmpeg")?;

        let mut cmd = Command::new(ffmpeg);
        cmd.args(writer_args(path, size, fps))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take();
        if stdin.is_none() {
            let _ = child.kill();
            return Err(LabError::ffmpeg("failed to open ffmpeg stdin", None));
        }

        Ok(Self {
            child: Some(child),
            stdin,
            size,
            path: path.to_path_buf(),
        })
    }
}

impl VideoWriter for FfmpegWriter {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| LabError::ffmpeg("writer already finished", None))?;

        if frame.dimensions() == self.size {
            stdin.write_all(frame.as_raw())?;
        } else {
            // The stream size is fixed by the first frame
            let resized = imageops::resize(frame, self.size.0, self.size.1, FilterType::Triangle);
            stdin.write_all(resized.as_raw())?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // Closing stdin signals end of stream
        drop(self.stdin.take());

        let Some(child) = self.child.take() else {
            return Ok(());
        };
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(LabError::ffmpeg(
                format!("encoding {} failed", self.path.display()),
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            ));
        }

        debug!("Finished writing {}", self.path.display());
        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            warn!("{}", err);
        }
    }
}
