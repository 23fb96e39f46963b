use image::RgbImage;
use std::fmt;
use std::path::PathBuf;

/// Rectangle marking a region of interest found by a processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Detection {
    /// Build a detection, rejecting empty rectangles
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { x, y, width, height })
    }

    /// Build a detection from signed extents (as reported by detector backends)
    pub fn from_signed(x: i32, y: i32, width: i32, height: i32) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        Self::new(x, y, width as u32, height as u32)
    }

    /// Centered rectangle covering half of each dimension
    pub fn centered_half(image_width: u32, image_height: u32) -> Option<Self> {
        Self::new(
            (image_width / 4) as i32,
            (image_height / 4) as i32,
            image_width / 2,
            image_height / 2,
        )
    }

    /// Build a detection from inclusive corner coordinates (as dlib reports them)
    pub fn from_inclusive_corners(left: i64, top: i64, right: i64, bottom: i64) -> Option<Self> {
        let width = right - left + 1;
        let height = bottom - top + 1;
        if width <= 0 || height <= 0 {
            return None;
        }
        Self::new(
            i32::try_from(left).ok()?,
            i32::try_from(top).ok()?,
            u32::try_from(width).ok()?,
            u32::try_from(height).ok()?,
        )
    }

    /// Map a detection found on an image enlarged `factor` times back to the original scale.
    ///
    /// Returns `None` when the box shrinks to nothing.
    pub fn scaled_down(&self, factor: u32) -> Option<Self> {
        if factor <= 1 {
            return Some(*self);
        }
        let factor = factor as f64;
        Self::new(
            (self.x as f64 / factor).round() as i32,
            (self.y as f64 / factor).round() as i32,
            (self.width as f64 / factor).round() as u32,
            (self.height as f64 / factor).round() as u32,
        )
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Outline thickness used when drawing this detection: 1 + log10 of the short side
    pub fn outline_thickness(&self) -> u32 {
        let short_side = self.width.min(self.height) as f64;
        (1.0 + short_side.log10()).floor().max(1.0) as u32
    }
}

/// Output of a processor: the processed image and any detections it produced
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub image: RgbImage,
    pub detections: Option<Vec<Detection>>,
}

impl ProcessingResult {
    /// Result carrying only an image
    pub fn image(image: RgbImage) -> Self {
        Self {
            image,
            detections: None,
        }
    }

    /// Result carrying an image and detections
    pub fn with_detections(image: RgbImage, detections: Vec<Detection>) -> Self {
        Self {
            image,
            detections: Some(detections),
        }
    }

    pub fn detection_count(&self) -> usize {
        self.detections.as_ref().map_or(0, Vec::len)
    }
}

/// Media type of a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Dispatch branch selected for an input, fixed for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Image,
    Video,
    Camera,
    Directory,
}

impl From<MediaKind> for Mode {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => Mode::Image,
            MediaKind::Video => Mode::Video,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Image => write!(f, "image"),
            Mode::Video => write!(f, "video"),
            Mode::Camera => write!(f, "camera"),
            Mode::Directory => write!(f, "directory"),
        }
    }
}

/// Live camera or video file read frame by frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    Camera(i32),
    File(PathBuf),
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSource::Camera(index) => write!(f, "camera #{}", index),
            CaptureSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// How much to shrink each image before processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Downsample {
    /// Halve the image this many times
    Factor(u32),
    /// Halve until the image fits inside these bounds
    Fit { max_width: u32, max_height: u32 },
}

impl Downsample {
    /// Number of halvings to apply to an image of the given size
    pub fn halvings_for(&self, width: u32, height: u32) -> u32 {
        match *self {
            Downsample::Factor(k) => k,
            Downsample::Fit {
                max_width,
                max_height,
            } => crate::filters::halvings_to_fit(width, height, max_width, max_height),
        }
    }
}

impl Default for Downsample {
    fn default() -> Self {
        Downsample::Factor(0)
    }
}
