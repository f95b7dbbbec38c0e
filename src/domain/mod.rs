//! Domain layer - Core detection logic
//!
//! Segment and signature entities, the repository traits the detector is
//! driven through, and the compiler and matcher services.

pub mod entities;
pub mod repositories;
pub mod services;
