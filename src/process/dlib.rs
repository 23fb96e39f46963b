//! Face detection with dlib: the frontal-face HOG detector, or a CNN (MMOD)
//! model when one is given.

use std::path::Path;

use dlib_face_recognition::{FaceDetector, FaceDetectorCnn, FaceDetectorTrait, ImageMatrix};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use imageproc::contrast::equalize_histogram;
use tracing::debug;

use crate::error::{LabError, Result};
use crate::filters;
use crate::models::{Detection, ProcessingResult};
use crate::process::Processor;

/// Largest accepted upsample count; each step doubles both sides
pub const MAX_UPSAMPLE: u32 = 3;

/// Parameters of the dlib detectors
#[derive(Debug, Clone, PartialEq)]
pub struct DlibConfig {
    /// Times the image is doubled before detection, to find smaller faces (default 1)
    pub upsample: u32,
    /// Equalize the grayscale histogram before detection (default true)
    pub equalize: bool,
}

impl Default for DlibConfig {
    fn default() -> Self {
        Self {
            upsample: 1,
            equalize: true,
        }
    }
}

impl DlibConfig {
    pub fn validate(&self) -> Result<()> {
        if self.upsample > MAX_UPSAMPLE {
            return Err(LabError::config(format!(
                "upsample must be at most {}, got {}",
                MAX_UPSAMPLE, self.upsample
            )));
        }
        Ok(())
    }

    pub fn checked(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

enum Model {
    Hog(FaceDetector),
    Cnn(FaceDetectorCnn),
}

/// dlib face detector
pub struct DlibFaceDetector {
    model: Model,
}

impl DlibFaceDetector {
    /// Frontal-face HOG detector (needs no model file)
    pub fn hog() -> Self {
        Self {
            model: Model::Hog(FaceDetector::new()),
        }
    }

    /// CNN detector loaded from an MMOD model file
    pub fn cnn(model: impl AsRef<Path>) -> Result<Self> {
        let model = model.as_ref();
        if !model.is_file() {
            return Err(LabError::NotFound(model.to_path_buf()));
        }

        let detector = FaceDetectorCnn::open(model).map_err(|e| {
            LabError::InvalidInput(format!("cannot load face model {}: {}", model.display(), e))
        })?;
        debug!("Loaded dlib model {}", model.display());
        Ok(Self {
            model: Model::Cnn(detector),
        })
    }

    /// CNN detector when a model is given, HOG otherwise
    pub fn from_model(model: Option<&Path>) -> Result<Self> {
        match model {
            Some(path) => Self::cnn(path),
            None => Ok(Self::hog()),
        }
    }

    pub fn is_cnn(&self) -> bool {
        matches!(self.model, Model::Cnn(_))
    }
}

impl Processor for DlibFaceDetector {
    type Config = DlibConfig;

    fn name(&self) -> &str {
        match self.model {
            Model::Hog(_) => "Face Detection (dlib HOG)",
            Model::Cnn(_) => "Face Detection (dlib CNN)",
        }
    }

    fn process(&mut self, image: RgbImage, config: &DlibConfig) -> Result<ProcessingResult> {
        config.validate()?;

        let mut gray = filters::to_grayscale(&image);
        if config.equalize {
            gray = equalize_histogram(&gray);
        }

        let scale = 1u32 << config.upsample;
        if scale > 1 {
            let (width, height) = gray.dimensions();
            gray = imageops::resize(&gray, width * scale, height * scale, FilterType::Triangle);
        }

        // dlib matrices are RGB; the gray level goes into all three channels
        let rgb = DynamicImage::ImageLuma8(gray).to_rgb8();
        let (width, height) = rgb.dimensions();
        // SAFETY: the buffer holds width * height * 3 bytes and outlives the matrix
        let matrix =
            unsafe { ImageMatrix::new(width as usize, height as usize, rgb.as_raw().as_ptr()) };

        let locations = match &self.model {
            Model::Hog(detector) => detector.face_locations(&matrix),
            Model::Cnn(detector) => detector.face_locations(&matrix),
        };

        let detections: Vec<Detection> = locations
            .iter()
            .filter_map(|r| Detection::from_inclusive_corners(r.left, r.top, r.right, r.bottom))
            .filter_map(|d| d.scaled_down(scale))
            .collect();
        debug!("{} found {} faces", self.name(), detections.len());

        Ok(ProcessingResult::with_detections(image, detections))
    }
}
