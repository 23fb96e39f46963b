pub mod capture;
#[cfg(feature = "opencv")]
pub mod cv;
pub mod dispatch;
pub mod error;
pub mod filters;
pub mod media;
pub mod models;
pub mod process;

pub use capture::{
    CaptureBackend, CaptureRunner, CaptureSummary, FfmpegBackend, FrameDisplay, FrameSource,
    HeadlessDisplay, VideoWriter, default_backend,
};
#[cfg(feature = "opencv")]
pub use capture::OpenCvBackend;
pub use dispatch::{DispatchReport, DispatchRequest, Dispatcher};
pub use error::{LabError, Result};
pub use media::{MediaTypes, classify};
pub use models::{CaptureSource, Detection, Downsample, MediaKind, Mode, ProcessingResult};
pub use process::{CartoonConfig, Cartoonify, ImageInput, Passthrough, Processor};
