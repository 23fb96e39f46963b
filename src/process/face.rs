//! Face detection backed by OpenCV.
//!
//! Two detectors share the same contract: a Haar cascade classifier and the
//! YuNet CNN detector loaded from a model file.

use std::path::{Path, PathBuf};

use image::RgbImage;
use imageproc::contrast::equalize_histogram;
use opencv::core::{Mat, Ptr, Rect, Size, Vector};
use opencv::objdetect::{CascadeClassifier, FaceDetectorYN};
use opencv::prelude::*;
use tracing::debug;

use crate::cv;
use crate::error::{LabError, Result};
use crate::filters;
use crate::models::{Detection, ProcessingResult};
use crate::process::Processor;

/// Cascade shipped with OpenCV for frontal faces
pub const DEFAULT_CASCADE: &str = "haarcascade_frontalface_default.xml";

const CASCADE_DIRS: &[&str] = &[
    "/usr/share/opencv4/haarcascades",
    "/usr/share/opencv/haarcascades",
    "/usr/local/share/opencv4/haarcascades",
    "/usr/local/share/opencv/haarcascades",
    "/opt/homebrew/share/opencv4/haarcascades",
];

/// Locate the default frontal-face cascade.
///
/// `OPENCV_HAARCASCADES` (a directory) takes precedence over the usual
/// install locations.
pub fn find_default_cascade() -> Option<PathBuf> {
    let from_env = std::env::var_os("OPENCV_HAARCASCADES").map(PathBuf::from);
    from_env
        .into_iter()
        .chain(CASCADE_DIRS.iter().map(PathBuf::from))
        .map(|dir| dir.join(DEFAULT_CASCADE))
        .find(|path| path.is_file())
}

/// Parameters of the cascade detector
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeConfig {
    /// Image pyramid scale step, > 1 (default 1.1)
    pub scale_factor: f64,
    /// Neighbouring hits a candidate needs to be kept (default 3)
    pub min_neighbors: i32,
    /// Smallest face side in pixels, 0 for no limit (default 0)
    pub min_size: u32,
    /// Equalize the grayscale histogram before detection (default true)
    pub equalize: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 3,
            min_size: 0,
            equalize: true,
        }
    }
}

impl CascadeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.scale_factor > 1.0) {
            return Err(LabError::config(format!(
                "scale factor must be greater than 1, got {}",
                self.scale_factor
            )));
        }
        if self.min_neighbors < 0 {
            return Err(LabError::config("min neighbors cannot be negative"));
        }
        Ok(())
    }

    pub fn checked(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

/// Haar cascade face detector
pub struct CascadeFaceDetector {
    classifier: CascadeClassifier,
    path: PathBuf,
}

impl CascadeFaceDetector {
    /// Load a cascade from an XML file
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(LabError::NotFound(path.to_path_buf()));
        }

        let classifier = CascadeClassifier::new(&path.to_string_lossy())?;
        if classifier.empty()? {
            return Err(LabError::InvalidInput(format!(
                "{} is not a usable cascade",
                path.display()
            )));
        }

        debug!("Loaded cascade {}", path.display());
        Ok(Self {
            classifier,
            path: path.to_path_buf(),
        })
    }

    /// Load the frontal-face cascade from the OpenCV data directory
    pub fn with_default_cascade() -> Result<Self> {
        let path =
            find_default_cascade().ok_or_else(|| LabError::NotFound(PathBuf::from(DEFAULT_CASCADE)))?;
        Self::new(path)
    }

    pub fn cascade_path(&self) -> &Path {
        &self.path
    }
}

impl Processor for CascadeFaceDetector {
    type Config = CascadeConfig;

    fn name(&self) -> &str {
        "Face Detection (cascade)"
    }

    fn process(&mut self, image: RgbImage, config: &CascadeConfig) -> Result<ProcessingResult> {
        config.validate()?;

        let mut gray = filters::to_grayscale(&image);
        if config.equalize {
            gray = equalize_histogram(&gray);
        }
        let gray = cv::gray_to_mat(&gray)?;

        let mut faces = Vector::<Rect>::new();
        let min_size = Size::new(config.min_size as i32, config.min_size as i32);
        self.classifier.detect_multi_scale(
            &gray,
            &mut faces,
            config.scale_factor,
            config.min_neighbors,
            0,
            min_size,
            Size::new(0, 0),
        )?;

        let detections: Vec<Detection> = faces
            .iter()
            .filter_map(|r| Detection::from_signed(r.x, r.y, r.width, r.height))
            .collect();
        debug!("Cascade found {} faces", detections.len());

        Ok(ProcessingResult::with_detections(image, detections))
    }
}

/// Parameters of the CNN detector
#[derive(Debug, Clone, PartialEq)]
pub struct CnnConfig {
    /// Minimum face confidence (default 0.9)
    pub score_threshold: f32,
    /// Non-maximum suppression overlap threshold (default 0.3)
    pub nms_threshold: f32,
    /// Candidates kept before suppression (default 5000)
    pub top_k: i32,
}

impl Default for CnnConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.9,
            nms_threshold: 0.3,
            top_k: 5000,
        }
    }
}

impl CnnConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(LabError::config("score threshold must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.nms_threshold) {
            return Err(LabError::config("NMS threshold must be within [0, 1]"));
        }
        if self.top_k <= 0 {
            return Err(LabError::config("top k must be positive"));
        }
        Ok(())
    }

    pub fn checked(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

/// CNN face detector (YuNet) loaded from an ONNX model
pub struct CnnFaceDetector {
    detector: Ptr<FaceDetectorYN>,
}

impl CnnFaceDetector {
    pub fn new(model: impl AsRef<Path>) -> Result<Self> {
        let model = model.as_ref();
        if !model.is_file() {
            return Err(LabError::NotFound(model.to_path_buf()));
        }

        let defaults = CnnConfig::default();
        let detector = FaceDetectorYN::create(
            &model.to_string_lossy(),
            "",
            Size::new(320, 320),
            defaults.score_threshold,
            defaults.nms_threshold,
            defaults.top_k,
            0,
            0,
        )?;

        debug!("Loaded face model {}", model.display());
        Ok(Self { detector })
    }
}

impl Processor for CnnFaceDetector {
    type Config = CnnConfig;

    fn name(&self) -> &str {
        "Face Detection (CNN)"
    }

    fn process(&mut self, image: RgbImage, config: &CnnConfig) -> Result<ProcessingResult> {
        config.validate()?;

        let frame = cv::rgb_to_mat(&image)?;
        self.detector
            .set_input_size(Size::new(image.width() as i32, image.height() as i32))?;
        self.detector.set_score_threshold(config.score_threshold)?;
        self.detector.set_nms_threshold(config.nms_threshold)?;
        self.detector.set_top_k(config.top_k)?;

        // One row per face: x, y, w, h, five landmarks, score
        let mut faces = Mat::default();
        self.detector.detect(&frame, &mut faces)?;

        let mut detections = Vec::new();
        for row in 0..faces.rows() {
            let x = *faces.at_2d::<f32>(row, 0)?;
            let y = *faces.at_2d::<f32>(row, 1)?;
            let w = *faces.at_2d::<f32>(row, 2)?;
            let h = *faces.at_2d::<f32>(row, 3)?;
            if let Some(detection) = Detection::from_signed(
                x.round() as i32,
                y.round() as i32,
                w.round() as i32,
                h.round() as i32,
            ) {
                detections.push(detection);
            }
        }
        debug!("CNN found {} faces", detections.len());

        Ok(ProcessingResult::with_detections(image, detections))
    }
}
