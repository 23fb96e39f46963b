mod common;

use common::*;
use image::{GrayImage, Luma, Rgb};
use imagelab::filters::{
    self, DETECTION_COLOR, adaptive_threshold_mean, bilateral_filter, draw_detections,
    halvings_to_fit, mask_with_edges, median_blur, pyr_down,
};
use imagelab::{Detection, ProcessingResult};

#[test]
fn test_pyr_down_halves_and_floors() {
    assert_eq!(pyr_down(&solid_frame(64, 48, TEST_RED)).dimensions(), (32, 24));
    assert_eq!(pyr_down(&solid_frame(5, 3, TEST_RED)).dimensions(), (2, 1));
    assert_eq!(pyr_down(&solid_frame(1, 1, TEST_RED)).dimensions(), (1, 1));
}

#[test]
fn test_downsample_repeats_halving() {
    let img = gradient_frame(64, 32);
    assert_eq!(filters::downsample(img.clone(), 0).dimensions(), (64, 32));
    assert_eq!(filters::downsample(img.clone(), 2).dimensions(), (16, 8));
    // Stops at 1x1 instead of looping forever on tiny inputs
    assert_eq!(filters::downsample(img, 20).dimensions(), (1, 1));
}

#[test]
fn test_halvings_to_fit() {
    assert_eq!(halvings_to_fit(640, 480, 640, 480), 0);
    assert_eq!(halvings_to_fit(640, 480, 320, 240), 1);
    assert_eq!(halvings_to_fit(642, 480, 320, 240), 2);
    assert_eq!(halvings_to_fit(200, 100, 60, 60), 2);
    assert_eq!(Downsample::Fit { max_width: 60, max_height: 60 }.halvings_for(200, 100), 2);
    assert_eq!(Downsample::Factor(3).halvings_for(10, 10), 3);
}

#[test]
fn test_bilateral_keeps_uniform_regions() {
    let img = solid_frame(12, 12, TEST_GRAY);
    let filtered = bilateral_filter(&img, 9, 9.0, 7.0);
    assert_eq!(filtered, img);
}

#[test]
fn test_bilateral_preserves_strong_edges() {
    // Left half black, right half white: color weights across the edge vanish
    let img = image::RgbImage::from_fn(10, 6, |x, _| {
        if x < 5 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
    });
    let filtered = bilateral_filter(&img, 5, 9.0, 7.0);
    assert_eq!(filtered.get_pixel(4, 3), &Rgb([0, 0, 0]));
    assert_eq!(filtered.get_pixel(5, 3), &Rgb([255, 255, 255]));
}

#[test]
fn test_bilateral_with_tiny_sigmas_keeps_input() {
    let img = gradient_frame(9, 7);
    let filtered = bilateral_filter(&img, 5, 1e-30, 1e-30);
    assert_eq!(filtered, img);
}

#[test]
fn test_median_blur_removes_speck() {
    let mut img = GrayImage::from_pixel(9, 9, Luma([10]));
    img.put_pixel(4, 4, Luma([250]));
    let blurred = median_blur(&img, 3);
    assert_eq!(blurred.get_pixel(4, 4), &Luma([10]));
}

#[test]
fn test_adaptive_threshold_marks_dark_lines() {
    // Bright image with a dark vertical line
    let img = GrayImage::from_fn(15, 15, |x, _| if x == 7 { Luma([20]) } else { Luma([200]) });
    let edges = adaptive_threshold_mean(&img, 5, 2);

    assert_eq!(edges.get_pixel(7, 7), &Luma([0]));
    assert_eq!(edges.get_pixel(0, 0), &Luma([255]));
    assert_eq!(edges.get_pixel(6, 7), &Luma([255]));
}

#[test]
fn test_adaptive_threshold_constant_shifts_cutoff() {
    let img = GrayImage::from_pixel(6, 6, Luma([100]));
    // pixel > mean - c: equal pixels pass with a positive constant, fail with zero
    assert!(adaptive_threshold_mean(&img, 3, 2).pixels().all(|p| p[0] == 255));
    assert!(adaptive_threshold_mean(&img, 3, 0).pixels().all(|p| p[0] == 0));
}

#[test]
fn test_adaptive_threshold_matches_clipped_window_mean() {
    let img = GrayImage::from_fn(11, 9, |x, y| Luma([((x * 37 + y * 91) % 256) as u8]));
    let (block, constant) = (5u32, 3i32);
    let edges = adaptive_threshold_mean(&img, block, constant);

    let radius = block / 2;
    for (x, y, pixel) in img.enumerate_pixels() {
        let xs = x.saturating_sub(radius)..=(x + radius).min(img.width() - 1);
        let ys = y.saturating_sub(radius)..=(y + radius).min(img.height() - 1);
        let mut sum = 0u32;
        let mut count = 0u32;
        for ny in ys {
            for nx in xs.clone() {
                sum += img.get_pixel(nx, ny)[0] as u32;
                count += 1;
            }
        }
        let mean = (sum as f64 / count as f64).round() as i32;
        let expected = if pixel[0] as i32 > mean - constant { 255 } else { 0 };
        assert_eq!(edges.get_pixel(x, y)[0], expected, "pixel ({}, {})", x, y);
    }
}

#[test]
fn test_mask_with_edges_is_bitwise_and() {
    let img = solid_frame(2, 1, [200, 100, 50]);
    let mut edges = GrayImage::new(2, 1);
    edges.put_pixel(0, 0, Luma([255]));
    edges.put_pixel(1, 0, Luma([0]));

    let masked = mask_with_edges(&img, &edges);
    assert_eq!(masked.get_pixel(0, 0), &Rgb([200, 100, 50]));
    assert_eq!(masked.get_pixel(1, 0), &Rgb([0, 0, 0]));
}

#[test]
fn test_detection_rejects_empty_boxes() {
    assert!(Detection::new(0, 0, 0, 10).is_none());
    assert!(Detection::new(0, 0, 10, 0).is_none());
    assert!(Detection::from_signed(0, 0, -3, 4).is_none());

    let detection = Detection::new(2, 3, 10, 20).expect("non-empty box");
    assert_eq!((detection.right(), detection.bottom()), (12, 23));
}

#[test]
fn test_detection_from_inclusive_corners() {
    assert_eq!(
        Detection::from_inclusive_corners(10, 20, 19, 29),
        Detection::new(10, 20, 10, 10)
    );
    assert!(Detection::from_inclusive_corners(5, 5, 4, 8).is_none());
    assert!(Detection::from_inclusive_corners(i64::MAX - 1, 0, i64::MAX - 1, 0).is_none());
}

#[test]
fn test_detection_scaled_down() {
    let detection = Detection::new(20, 40, 40, 10).expect("non-empty box");
    assert_eq!(detection.scaled_down(1), Some(detection));
    assert_eq!(detection.scaled_down(2), Detection::new(10, 20, 20, 5));
    let tiny = Detection::new(8, 8, 1, 1).expect("non-empty box");
    assert!(tiny.scaled_down(4).is_none());
}

#[test]
fn test_outline_thickness_grows_with_size() {
    let thickness = |side| Detection::new(0, 0, side, side + 50).map(|d| d.outline_thickness());
    assert_eq!(thickness(1), Some(1));
    assert_eq!(thickness(9), Some(1));
    assert_eq!(thickness(10), Some(2));
    assert_eq!(thickness(120), Some(3));
}

#[test]
fn test_centered_half() {
    let rect = Detection::centered_half(100, 60).expect("non-empty box");
    assert_eq!(rect, Detection { x: 25, y: 15, width: 50, height: 30 });
    assert!(Detection::centered_half(1, 1).is_none());
}

#[test]
fn test_draw_detections_outlines_box() {
    let mut img = solid_frame(40, 40, [255, 255, 255]);
    let detection = Detection::new(5, 5, 20, 20).expect("non-empty box");
    draw_detections(&mut img, &[detection]);

    // Thickness 2: outer and first inner ring are drawn, inside stays white
    assert_eq!(img.get_pixel(5, 5), &DETECTION_COLOR);
    assert_eq!(img.get_pixel(6, 6), &DETECTION_COLOR);
    assert_eq!(img.get_pixel(24, 15), &DETECTION_COLOR);
    assert_eq!(img.get_pixel(15, 15), &Rgb([255, 255, 255]));
    assert_eq!(img.get_pixel(2, 2), &Rgb([255, 255, 255]));
}

#[test]
fn test_draw_detections_clips_at_border() {
    let mut img = solid_frame(10, 10, [255, 255, 255]);
    let detection = Detection::new(-5, -5, 30, 30).expect("non-empty box");
    draw_detections(&mut img, &[detection]);
    assert_eq!(img.dimensions(), (10, 10));
}

#[test]
fn test_processing_result_counts_detections() {
    let img = solid_frame(4, 4, TEST_BLUE);
    assert_eq!(ProcessingResult::image(img.clone()).detection_count(), 0);

    let boxes = vec![Detection::new(0, 0, 2, 2).expect("non-empty box"); 3];
    assert_eq!(ProcessingResult::with_detections(img, boxes).detection_count(), 3);
}
