use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::filter::median_filter;
use imageproc::integral_image::{integral_image, sum_image_pixels};
use imageproc::rect::Rect;

use crate::models::Detection;

/// Outline color for detections (blue)
pub const DETECTION_COLOR: Rgb<u8> = Rgb([0, 0, 200]);

/// Convert image to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    imageops::grayscale(img)
}

/// Halve both dimensions after Gaussian smoothing, never going below 1x1
pub fn pyr_down(img: &RgbImage) -> RgbImage {
    let width = (img.width() / 2).max(1);
    let height = (img.height() / 2).max(1);
    imageops::resize(img, width, height, FilterType::Gaussian)
}

/// Apply `pyr_down` `times` times
pub fn downsample(img: RgbImage, times: u32) -> RgbImage {
    let mut img = img;
    for _ in 0..times {
        if img.width() <= 1 && img.height() <= 1 {
            break;
        }
        img = pyr_down(&img);
    }
    img
}

/// Smallest number of halvings after which (width, height) fits in (max_width, max_height)
pub fn halvings_to_fit(width: u32, height: u32, max_width: u32, max_height: u32) -> u32 {
    let max_width = max_width.max(1);
    let max_height = max_height.max(1);
    let (mut w, mut h) = (width, height);
    let mut halvings = 0;

    while w > max_width || h > max_height {
        w /= 2;
        h /= 2;
        halvings += 1;
    }

    halvings
}

/// Edge-preserving smoothing of a color image.
///
/// Each output pixel is the average of its neighbours within `diameter / 2`,
/// weighted by spatial distance (`sigma_space`) and by the summed absolute
/// channel difference to the center pixel (`sigma_color`). Borders replicate
/// the edge pixels.
pub fn bilateral_filter(
    img: &RgbImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> RgbImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let radius = (diameter / 2) as i32;
    // Coefficients in f64: squaring a tiny f32 sigma underflows to zero
    let color_coeff = -0.5 / (sigma_color as f64).powi(2);
    let space_coeff = -0.5 / (sigma_space as f64).powi(2);

    // Color weight indexed by the L1 distance between two RGB pixels
    let color_weights: Vec<f32> = (0..=3 * 255u32)
        .map(|d| ((d * d) as f64 * color_coeff).exp() as f32)
        .collect();

    // Circular spatial kernel
    let mut kernel = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f64;
            if r2.sqrt() > radius as f64 {
                continue;
            }
            kernel.push((dx, dy, (r2 * space_coeff).exp() as f32));
        }
    }

    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;
    let mut filtered = RgbImage::new(width, height);

    for (x, y, center) in img.enumerate_pixels() {
        let mut sum = [0f32; 3];
        let mut weight_sum = 0f32;

        for &(dx, dy, space_weight) in &kernel {
            let nx = (x as i32 + dx).clamp(0, max_x) as u32;
            let ny = (y as i32 + dy).clamp(0, max_y) as u32;
            let neighbour = img.get_pixel(nx, ny);

            let distance = (0..3)
                .map(|c| (neighbour[c] as i32 - center[c] as i32).unsigned_abs())
                .sum::<u32>() as usize;
            let weight = space_weight * color_weights[distance];

            for c in 0..3 {
                sum[c] += neighbour[c] as f32 * weight;
            }
            weight_sum += weight;
        }

        let channel = |c: usize| (sum[c] / weight_sum).round().clamp(0.0, 255.0) as u8;
        filtered.put_pixel(x, y, Rgb([channel(0), channel(1), channel(2)]));
    }

    filtered
}

/// Median blur with a square `kernel_size` window
pub fn median_blur(img: &GrayImage, kernel_size: u32) -> GrayImage {
    let radius = kernel_size / 2;
    median_filter(img, radius, radius)
}

/// Binary adaptive threshold against the local mean.
///
/// A pixel becomes 255 when it is brighter than the mean of its
/// `block_size` x `block_size` neighbourhood minus `constant`, otherwise 0.
/// The neighbourhood is clipped at the image border.
pub fn adaptive_threshold_mean(img: &GrayImage, block_size: u32, constant: i32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let integral = integral_image::<_, u64>(img);
    let radius = block_size / 2;
    let mut thresholded = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let left = x.saturating_sub(radius);
        let top = y.saturating_sub(radius);
        let right = (x + radius).min(width - 1);
        let bottom = (y + radius).min(height - 1);

        let sum = sum_image_pixels(&integral, left, top, right, bottom)[0];
        let count = ((right - left + 1) * (bottom - top + 1)) as f64;
        let mean = (sum as f64 / count).round() as i32;

        let value = if pixel[0] as i32 > mean - constant { 255 } else { 0 };
        thresholded.put_pixel(x, y, Luma([value]));
    }

    thresholded
}

/// Bitwise AND of each color channel with the corresponding edge mask value
pub fn mask_with_edges(img: &RgbImage, edges: &GrayImage) -> RgbImage {
    let mut masked = img.clone();
    for (x, y, pixel) in masked.enumerate_pixels_mut() {
        let mask = edges.get_pixel(x, y)[0];
        for c in 0..3 {
            pixel[c] &= mask;
        }
    }
    masked
}

/// Draw each detection as a hollow rectangle whose thickness grows with its size
pub fn draw_detections(img: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
        let thickness = detection.outline_thickness();

        // Thick outlines are drawn as nested rectangles growing inward
        for inset in 0..thickness {
            let width = detection.width.saturating_sub(2 * inset);
            let height = detection.height.saturating_sub(2 * inset);
            if width == 0 || height == 0 {
                break;
            }
            let rect = Rect::at(detection.x + inset as i32, detection.y + inset as i32)
                .of_size(width, height);
            draw_hollow_rect_mut(img, rect, DETECTION_COLOR);
        }
    }
}
