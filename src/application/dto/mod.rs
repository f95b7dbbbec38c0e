//! Data Transfer Objects

mod detect_options;
mod detection_report;

pub use detect_options::DetectOptions;
pub use detection_report::{DetectionOutcome, DetectionReport};
