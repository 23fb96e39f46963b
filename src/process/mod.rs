pub mod cartoon;
#[cfg(feature = "dlib")]
pub mod dlib;
#[cfg(feature = "opencv")]
pub mod face;
#[cfg(feature = "opencv")]
pub mod foreground;

use image::RgbImage;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{LabError, Result};
use crate::filters;
use crate::models::ProcessingResult;

pub use cartoon::{CartoonConfig, Cartoonify};
#[cfg(feature = "dlib")]
pub use dlib::{DlibConfig, DlibFaceDetector};
#[cfg(feature = "opencv")]
pub use face::{CascadeConfig, CascadeFaceDetector, CnnConfig, CnnFaceDetector};
#[cfg(feature = "opencv")]
pub use foreground::{Foreground, ForegroundConfig};

/// Image handed to a processor, either decoded or still on disk
#[derive(Debug, Clone)]
pub enum ImageInput {
    Image(RgbImage),
    Path(PathBuf),
}

impl ImageInput {
    /// Decode the image if needed
    pub fn load(self) -> Result<RgbImage> {
        match self {
            ImageInput::Image(image) => Ok(image),
            ImageInput::Path(path) => {
                if !path.is_file() {
                    return Err(LabError::NotFound(path));
                }
                Ok(image::open(&path)?.to_rgb8())
            }
        }
    }
}

impl From<RgbImage> for ImageInput {
    fn from(image: RgbImage) -> Self {
        ImageInput::Image(image)
    }
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        ImageInput::Path(path)
    }
}

/// Trait that all processing functions implement
pub trait Processor {
    /// Parameters for one call, forwarded untouched by the dispatcher
    type Config;

    /// Human-readable name (used in log output)
    fn name(&self) -> &str;

    /// Process one image and return the result with optional detections
    fn process(&mut self, image: RgbImage, config: &Self::Config) -> Result<ProcessingResult>;

    /// Process an image that may still need to be loaded from disk
    fn process_input(
        &mut self,
        input: ImageInput,
        config: &Self::Config,
    ) -> Result<ProcessingResult> {
        let image = input.load()?;
        self.process(image, config)
    }
}

/// Run a processor and draw its detections onto the output image
pub fn render<P: Processor>(
    processor: &mut P,
    image: RgbImage,
    config: &P::Config,
) -> Result<RgbImage> {
    let result = processor.process(image, config)?;
    debug!("{} produced {} detections", processor.name(), result.detection_count());

    let mut image = result.image;
    if let Some(detections) = &result.detections {
        filters::draw_detections(&mut image, detections);
    }
    Ok(image)
}

/// Processor that returns frames unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Processor for Passthrough {
    type Config = ();

    fn name(&self) -> &str {
        "Passthrough"
    }

    fn process(&mut self, image: RgbImage, _config: &()) -> Result<ProcessingResult> {
        Ok(ProcessingResult::image(image))
    }
}
