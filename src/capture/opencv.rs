//! Capture backend built on OpenCV's videoio and highgui modules.

use std::path::Path;

use image::RgbImage;
use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::{highgui, videoio};
use tracing::debug;

use super::{CaptureBackend, FrameDisplay, FrameSource, VideoWriter};
use crate::cv;
use crate::error::{LabError, Result};
use crate::models::CaptureSource;

/// Capture backend using `VideoCapture`, `VideoWriter` and a highgui window
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCvBackend;

impl OpenCvBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for OpenCvBackend {
    fn name(&self) -> &str {
        "opencv"
    }

    fn open_source(&self, source: &CaptureSource) -> Result<Box<dyn FrameSource>> {
        let capture = match source {
            CaptureSource::Camera(index) => videoio::VideoCapture::new(*index, videoio::CAP_ANY)?,
            CaptureSource::File(path) => {
                videoio::VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?
            }
        };

        if !capture.is_opened()? {
            return Err(LabError::Open {
                uri: source.to_string(),
            });
        }

        Ok(Box::new(OpenCvSource {
            capture,
            frame: Mat::default(),
        }))
    }

    fn open_display(&self, title: &str) -> Result<Box<dyn FrameDisplay>> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)?;
        Ok(Box::new(HighGuiDisplay {
            title: title.to_string(),
            open: true,
        }))
    }

    fn open_writer(&self, path: &Path, size: (u32, u32), fps: f64) -> Result<Box<dyn VideoWriter>> {
        let fourcc = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G')?;
        let writer = videoio::VideoWriter::new(
            &path.to_string_lossy(),
            fourcc,
            fps,
            Size::new(size.0 as i32, size.1 as i32),
            true,
        )?;

        if !writer.is_opened()? {
            return Err(LabError::Open {
                uri: path.display().to_string(),
            });
        }

        Ok(Box::new(OpenCvWriter {
            writer,
            open: true,
        }))
    }
}

struct OpenCvSource {
    capture: videoio::VideoCapture,
    frame: Mat,
}

impl FrameSource for OpenCvSource {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        if !self.capture.read(&mut self.frame)? || self.frame.empty() {
            return Ok(None);
        }
        cv::mat_to_rgb(&self.frame).map(Some)
    }

    fn release(&mut self) {
        let _ = self.capture.release();
    }
}

impl Drop for OpenCvSource {
    fn drop(&mut self) {
        self.release();
    }
}

struct HighGuiDisplay {
    title: String,
    open: bool,
}

impl FrameDisplay for HighGuiDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<()> {
        highgui::imshow(&self.title, &cv::rgb_to_mat(frame)?)?;
        Ok(())
    }

    fn poll_key(&mut self, delay_ms: i32) -> Result<Option<i32>> {
        let key = highgui::wait_key(delay_ms)?;
        Ok((key >= 0).then_some(key & 0xFF))
    }

    fn close(&mut self) {
        if self.open {
            let _ = highgui::destroy_all_windows();
            self.open = false;
            debug!("Closed window {}", self.title);
        }
    }
}

impl Drop for HighGuiDisplay {
    fn drop(&mut self) {
        self.close();
    }
}

struct OpenCvWriter {
    writer: videoio::VideoWriter,
    open: bool,
}

impl VideoWriter for OpenCvWriter {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        self.writer.write(&cv::rgb_to_mat(frame)?)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.writer.release()?;
        }
        Ok(())
    }
}

impl Drop for OpenCvWriter {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
