#![cfg(feature = "opencv")]

mod common;

use common::*;
use imagelab::cv;
use imagelab::process::{CascadeConfig, CnnConfig, Foreground, ForegroundConfig};
use imagelab::{Detection, Processor};

#[test]
fn test_mat_conversion_preserves_channel_order() -> anyhow::Result<()> {
    let img = gradient_frame(7, 5);
    let mat = cv::rgb_to_mat(&img)?;
    assert_eq!(cv::mat_to_rgb(&mat)?, img);
    Ok(())
}

#[test]
fn test_cascade_config_validation() {
    assert!(CascadeConfig::default().validate().is_ok());
    let bad_scale = CascadeConfig {
        scale_factor: 1.0,
        ..CascadeConfig::default()
    };
    assert!(matches!(bad_scale.checked(), Err(LabError::Config(_))));
    let bad_neighbors = CascadeConfig {
        min_neighbors: -1,
        ..CascadeConfig::default()
    };
    assert!(bad_neighbors.validate().is_err());
}

#[test]
fn test_cnn_config_defaults() {
    let config = CnnConfig::default();
    assert_eq!(config.score_threshold, 0.9);
    assert_eq!(config.nms_threshold, 0.3);
    assert_eq!(config.top_k, 5000);
    assert!(config.validate().is_ok());
}

#[test]
fn test_foreground_config_validation() {
    assert!(ForegroundConfig::default().validate().is_ok());
    let no_iterations = ForegroundConfig {
        iterations: 0,
        ..ForegroundConfig::default()
    };
    assert!(no_iterations.validate().is_err());
    let outside = ForegroundConfig {
        rect: Detection::new(-4, 0, 10, 10),
        ..ForegroundConfig::default()
    };
    assert!(outside.validate().is_err());
}

#[test]
fn test_foreground_blacks_out_border() -> anyhow::Result<()> {
    // Bright square on a dark, slightly textured background
    let img = image::RgbImage::from_fn(64, 64, |x, y| {
        if (20..44).contains(&x) && (20..44).contains(&y) {
            image::Rgb([230, 60, 40])
        } else {
            image::Rgb([20 + (x % 5) as u8, 40 + (y % 7) as u8, 90])
        }
    });

    let config = ForegroundConfig {
        rect: Detection::new(12, 12, 40, 40),
        iterations: 3,
    };
    let result = Foreground::new().process(img, &config)?;

    assert_eq!(result.image.dimensions(), (64, 64));
    assert!(result.detections.is_none());
    // Pixels outside the initial box are background by construction
    assert_eq!(result.image.get_pixel(2, 2), &image::Rgb([0, 0, 0]));
    Ok(())
}
