//! Repository traits (interfaces)
//!
//! Contracts for the collaborators the domain depends on but does not
//! implement: signature sources and stream buffering.

mod catalog_source;
mod stream_buffer;

pub use catalog_source::{CatalogError, CatalogSource};
pub use stream_buffer::StreamBuffer;
