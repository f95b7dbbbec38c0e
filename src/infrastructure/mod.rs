//! Infrastructure layer
//!
//! Concrete implementations of the domain repositories: catalog sources
//! and stream buffering over `std::io`.

pub mod buffering;
pub mod catalog;
