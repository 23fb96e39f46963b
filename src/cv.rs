//! Conversions between `image` buffers and OpenCV matrices.

use image::{GrayImage, RgbImage};
use opencv::core::{CV_8UC1, CV_8UC3, Mat};
use opencv::prelude::*;

use crate::error::{LabError, Result};

/// Copy an RGB image into a BGR `Mat`
pub fn rgb_to_mat(image: &RgbImage) -> Result<Mat> {
    let mut bgr = Vec::with_capacity(image.as_raw().len());
    for pixel in image.pixels() {
        bgr.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
    }
    bytes_to_mat(&bgr, 3, image.height())
}

/// Copy a grayscale image into a single-channel `Mat`
pub fn gray_to_mat(image: &GrayImage) -> Result<Mat> {
    bytes_to_mat(image.as_raw(), 1, image.height())
}

fn bytes_to_mat(bytes: &[u8], channels: i32, rows: u32) -> Result<Mat> {
    let flat = Mat::from_slice(bytes)?;
    let shaped = flat.reshape(channels, rows as i32)?;
    let mut mat = Mat::default();
    shaped.copy_to(&mut mat)?;
    Ok(mat)
}

/// Copy a BGR `Mat` into an RGB image
pub fn mat_to_rgb(mat: &Mat) -> Result<RgbImage> {
    if mat.typ() != CV_8UC3 {
        return Err(LabError::InvalidInput(format!(
            "expected an 8-bit BGR frame, got matrix type {}",
            mat.typ()
        )));
    }

    let width = mat.cols() as u32;
    let height = mat.rows() as u32;
    let rgb: Vec<u8> = continuous_bytes(mat)?
        .chunks_exact(3)
        .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
        .collect();

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| LabError::InvalidInput("frame buffer does not match its size".into()))
}

/// Raw bytes of a single-channel 8-bit `Mat` (e.g. a segmentation mask)
pub fn mask_bytes(mat: &Mat) -> Result<Vec<u8>> {
    if mat.typ() != CV_8UC1 {
        return Err(LabError::InvalidInput(format!(
            "expected an 8-bit mask, got matrix type {}",
            mat.typ()
        )));
    }
    continuous_bytes(mat)
}

fn continuous_bytes(mat: &Mat) -> Result<Vec<u8>> {
    if mat.is_continuous() {
        return Ok(mat.data_bytes()?.to_vec());
    }
    let copy = mat.try_clone()?;
    Ok(copy.data_bytes()?.to_vec())
}
