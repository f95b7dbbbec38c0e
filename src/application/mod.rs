//! Application layer
//!
//! Use cases that drive the domain services over real inputs.

mod detect_content;
pub mod dto;

pub use detect_content::DetectContentUseCase;
