use image::{Rgb, RgbImage};
use opencv::core::{Mat, Rect};
use opencv::imgproc;
use tracing::debug;

use crate::cv;
use crate::error::{LabError, Result};
use crate::models::{Detection, ProcessingResult};
use crate::process::Processor;

/// Parameters of the GrabCut foreground extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ForegroundConfig {
    /// Initial foreground box; defaults to the centered half-size rectangle
    pub rect: Option<Detection>,
    /// GrabCut iterations (default 5)
    pub iterations: u32,
}

impl Default for ForegroundConfig {
    fn default() -> Self {
        Self {
            rect: None,
            iterations: 5,
        }
    }
}

impl ForegroundConfig {
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(LabError::config("GrabCut needs at least one iteration"));
        }
        if let Some(rect) = &self.rect {
            if rect.x < 0 || rect.y < 0 {
                return Err(LabError::config("foreground box must start inside the image"));
            }
        }
        Ok(())
    }

    pub fn checked(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

/// GrabCut foreground extraction.
///
/// Background and probable-background pixels are zeroed. The segmentation
/// mask and color models are kept between calls.
pub struct Foreground {
    mask: Mat,
    bgd_model: Mat,
    fgd_model: Mat,
}

impl Foreground {
    pub fn new() -> Self {
        Self {
            mask: Mat::default(),
            bgd_model: Mat::default(),
            fgd_model: Mat::default(),
        }
    }
}

impl Default for Foreground {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Foreground {
    type Config = ForegroundConfig;

    fn name(&self) -> &str {
        "GrabCut"
    }

    fn process(&mut self, image: RgbImage, config: &ForegroundConfig) -> Result<ProcessingResult> {
        config.validate()?;

        let (width, height) = image.dimensions();
        let rect = config
            .rect
            .or_else(|| Detection::centered_half(width, height))
            .ok_or_else(|| {
                LabError::InvalidInput(format!(
                    "{}x{} image is too small for foreground extraction",
                    width, height
                ))
            })?;

        // Clamp the initial box to the frame
        let x = (rect.x as u32).min(width.saturating_sub(1));
        let y = (rect.y as u32).min(height.saturating_sub(1));
        let w = rect.width.min(width - x).max(1);
        let h = rect.height.min(height - y).max(1);

        let frame = cv::rgb_to_mat(&image)?;
        imgproc::grabcut(
            &frame,
            &mut self.mask,
            Rect::new(x as i32, y as i32, w as i32, h as i32),
            &mut self.bgd_model,
            &mut self.fgd_model,
            config.iterations as i32,
            imgproc::GC_INIT_WITH_RECT,
        )?;

        let labels = cv::mask_bytes(&self.mask)?;
        let mut extracted = image;
        let mut kept = 0usize;
        for (pixel, label) in extracted.pixels_mut().zip(labels) {
            let label = label as i32;
            if label == imgproc::GC_FGD || label == imgproc::GC_PR_FGD {
                kept += 1;
            } else {
                *pixel = Rgb([0, 0, 0]);
            }
        }
        debug!("GrabCut kept {} foreground pixels", kept);

        Ok(ProcessingResult::image(extracted))
    }
}
