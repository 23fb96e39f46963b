use image::RgbImage;
use tracing::debug;

use crate::error::{LabError, Result};
use crate::filters;
use crate::models::ProcessingResult;
use crate::process::Processor;

/// Parameters of the cartoon stylization
#[derive(Debug, Clone, PartialEq)]
pub struct CartoonConfig {
    /// Number of bilateral filter passes (default 7)
    pub bilateral_stages: u32,
    /// Bilateral filter neighbourhood diameter (default 9)
    pub bilateral_diameter: u32,
    /// Bilateral filter sigma in color space (default 9)
    pub bilateral_sigma_color: f32,
    /// Bilateral filter sigma in coordinate space (default 7)
    pub bilateral_sigma_space: f32,
    /// Median blur kernel size, odd (default 9)
    pub blur_kernel_size: u32,
    /// Adaptive threshold block size, odd (default 9)
    pub adaptive_thresh_block: u32,
    /// Constant subtracted from the local mean (default 2)
    pub adaptive_thresh_const: i32,
}

impl Default for CartoonConfig {
    fn default() -> Self {
        Self {
            bilateral_stages: 7,
            bilateral_diameter: 9,
            bilateral_sigma_color: 9.0,
            bilateral_sigma_space: 7.0,
            blur_kernel_size: 9,
            adaptive_thresh_block: 9,
            adaptive_thresh_const: 2,
        }
    }
}

impl CartoonConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bilateral_diameter == 0 {
            return Err(LabError::config("bilateral diameter must be at least 1"));
        }
        if !(self.bilateral_sigma_color > 0.0) || !(self.bilateral_sigma_space > 0.0) {
            return Err(LabError::config("bilateral sigmas must be positive"));
        }
        if self.blur_kernel_size < 3 || self.blur_kernel_size % 2 == 0 {
            return Err(LabError::config(format!(
                "blur kernel size must be odd and at least 3, got {}",
                self.blur_kernel_size
            )));
        }
        if self.adaptive_thresh_block < 3 || self.adaptive_thresh_block % 2 == 0 {
            return Err(LabError::config(format!(
                "adaptive threshold block must be odd and at least 3, got {}",
                self.adaptive_thresh_block
            )));
        }
        Ok(())
    }

    /// Validate and return the config
    pub fn checked(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

/// Make an image look like a cartoon.
///
/// Repeated bilateral filtering flattens colors while keeping edges, and a
/// mean adaptive threshold of the median-blurred grayscale image supplies
/// dark outlines which are masked onto the flattened image.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cartoonify;

impl Processor for Cartoonify {
    type Config = CartoonConfig;

    fn name(&self) -> &str {
        "Cartoonify"
    }

    fn process(&mut self, image: RgbImage, config: &CartoonConfig) -> Result<ProcessingResult> {
        config.validate()?;

        let mut smoothed = image;
        for stage in 0..config.bilateral_stages {
            debug!("Bilateral pass {}/{}", stage + 1, config.bilateral_stages);
            smoothed = filters::bilateral_filter(
                &smoothed,
                config.bilateral_diameter,
                config.bilateral_sigma_color,
                config.bilateral_sigma_space,
            );
        }

        let gray = filters::to_grayscale(&smoothed);
        let blurred = filters::median_blur(&gray, config.blur_kernel_size);
        let edges = filters::adaptive_threshold_mean(
            &blurred,
            config.adaptive_thresh_block,
            config.adaptive_thresh_const,
        );

        Ok(ProcessingResult::image(filters::mask_with_edges(
            &smoothed, &edges,
        )))
    }
}
