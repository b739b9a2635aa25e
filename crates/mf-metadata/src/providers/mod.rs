//! Concrete metadata provider implementations.
//!
//! Each submodule implements the [`MetadataProvider`](super::MetadataProvider)
//! trait for a single data source.

pub mod fanart;
pub mod local_trailers;

pub use fanart::FanartProvider;
pub use local_trailers::LocalTrailerProvider;
