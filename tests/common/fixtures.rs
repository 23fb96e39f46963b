use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use image::{ImageBuffer, Rgb, RgbImage};
use imagelab::{
    CaptureBackend, CaptureSource, Detection, FrameDisplay, FrameSource, LabError,
    ProcessingResult, Processor, Result, VideoWriter,
};
use tempfile::NamedTempFile;

/// Solid color frame of the given size
pub fn solid_frame(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    ImageBuffer::from_pixel(width, height, Rgb(color))
}

/// Frame with a horizontal and vertical gradient, so resizes are visible
pub fn gradient_frame(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    })
}

/// Creates a 100x100 red test image and returns the temp file.
/// The file will be automatically cleaned up when dropped.
pub fn create_test_image() -> NamedTempFile {
    let img = solid_frame(100, 100, [255, 0, 0]);
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Writes a gradient PNG of the given size into `dir` and returns its path
pub fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    gradient_frame(width, height)
        .save(&path)
        .expect("Failed to save test image");
    path
}

/// Writes arbitrary bytes into `dir` (for files only classified by extension)
pub fn write_bytes(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("Failed to write test file");
    path
}

/// Everything the fake backend was asked to do
#[derive(Debug, Default)]
pub struct CaptureLog {
    pub sources_opened: Vec<CaptureSource>,
    pub source_released: bool,
    pub display_titles: Vec<String>,
    pub frames_shown: usize,
    pub display_closed: bool,
    pub writers_opened: Vec<(PathBuf, (u32, u32), f64)>,
    pub frames_written: Vec<(u32, u32)>,
    pub last_written: Option<RgbImage>,
    pub writers_finished: usize,
}

/// In-memory capture backend replaying scripted frames
pub struct FakeBackend {
    frames: Vec<RgbImage>,
    escape_after: Option<usize>,
    fail_open: bool,
    log: Rc<RefCell<CaptureLog>>,
}

impl FakeBackend {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames,
            escape_after: None,
            fail_open: false,
            log: Rc::new(RefCell::new(CaptureLog::default())),
        }
    }

    /// Press escape once this many frames have been shown
    pub fn with_escape_after(mut self, frames: usize) -> Self {
        self.escape_after = Some(frames);
        self
    }

    /// Make every source fail to open
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn log(&self) -> Ref<'_, CaptureLog> {
        self.log.borrow()
    }
}

impl CaptureBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn open_source(&self, source: &CaptureSource) -> Result<Box<dyn FrameSource>> {
        if self.fail_open {
            return Err(LabError::Open {
                uri: source.to_string(),
            });
        }
        self.log.borrow_mut().sources_opened.push(source.clone());
        Ok(Box::new(FakeSource {
            frames: self.frames.iter().cloned().collect(),
            log: Rc::clone(&self.log),
        }))
    }

    fn open_display(&self, title: &str) -> Result<Box<dyn FrameDisplay>> {
        self.log.borrow_mut().display_titles.push(title.to_string());
        Ok(Box::new(FakeDisplay {
            shown: 0,
            escape_after: self.escape_after,
            log: Rc::clone(&self.log),
        }))
    }

    fn open_writer(&self, path: &Path, size: (u32, u32), fps: f64) -> Result<Box<dyn VideoWriter>> {
        self.log
            .borrow_mut()
            .writers_opened
            .push((path.to_path_buf(), size, fps));
        Ok(Box::new(FakeWriter {
            log: Rc::clone(&self.log),
        }))
    }
}

struct FakeSource {
    frames: VecDeque<RgbImage>,
    log: Rc<RefCell<CaptureLog>>,
}

impl FrameSource for FakeSource {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }

    fn release(&mut self) {
        self.log.borrow_mut().source_released = true;
    }
}

struct FakeDisplay {
    shown: usize,
    escape_after: Option<usize>,
    log: Rc<RefCell<CaptureLog>>,
}

impl FrameDisplay for FakeDisplay {
    fn show(&mut self, _frame: &RgbImage) -> Result<()> {
        self.shown += 1;
        self.log.borrow_mut().frames_shown += 1;
        Ok(())
    }

    fn poll_key(&mut self, _delay_ms: i32) -> Result<Option<i32>> {
        match self.escape_after {
            Some(limit) if self.shown >= limit => Ok(Some(imagelab::capture::KEY_ESCAPE)),
            _ => Ok(None),
        }
    }

    fn close(&mut self) {
        self.log.borrow_mut().display_closed = true;
    }
}

struct FakeWriter {
    log: Rc<RefCell<CaptureLog>>,
}

impl VideoWriter for FakeWriter {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        let mut log = self.log.borrow_mut();
        log.frames_written.push(frame.dimensions());
        log.last_written = Some(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.log.borrow_mut().writers_finished += 1;
        Ok(())
    }
}

/// Processor that counts calls, optionally reports a box and fails on a given call
#[derive(Debug, Default)]
pub struct CountingProcessor {
    pub calls: usize,
    pub fail_on_call: Option<usize>,
    pub detection: Option<Detection>,
}

impl CountingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn detecting(detection: Detection) -> Self {
        Self {
            detection: Some(detection),
            ..Self::default()
        }
    }
}

impl Processor for CountingProcessor {
    type Config = ();

    fn name(&self) -> &str {
        "Counting"
    }

    fn process(&mut self, image: RgbImage, _config: &()) -> Result<ProcessingResult> {
        self.calls += 1;
        if self.fail_on_call == Some(self.calls) {
            return Err(LabError::InvalidInput(format!("failure on call {}", self.calls)));
        }
        Ok(match self.detection {
            Some(detection) => ProcessingResult::with_detections(image, vec![detection]),
            None => ProcessingResult::image(image),
        })
    }
}
