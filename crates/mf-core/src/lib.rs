//! mf-core: shared ids, media types, errors, and configuration.
//!
//! This crate is the foundational dependency for the other mf-* crates,
//! providing type-safe identifiers, a unified error type, the media item
//! data model, and the application configuration.

pub mod config;
pub mod error;
pub mod ids;
pub mod item;
pub mod media;
pub mod paths;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use item::{FileSystemEntry, MediaItem, ResolveArgs, TrailerRef};
pub use media::*;
