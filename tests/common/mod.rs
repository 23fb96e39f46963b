#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from imagelab for tests
pub use imagelab::{
    CaptureRunner, CaptureSource, DispatchRequest, Dispatcher, Downsample, LabError, MediaKind,
    MediaTypes, Mode,
};

/// Test color constants
pub const TEST_RED: [u8; 3] = [255, 0, 0];
pub const TEST_BLUE: [u8; 3] = [0, 0, 255];
pub const TEST_GRAY: [u8; 3] = [120, 120, 120];
