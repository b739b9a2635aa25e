//! mediaforged - media library metadata enrichment
//!
//! This library crate wires the `mf-metadata` engine to the filesystem and the
//! network, and is exposed for integration testing.

pub mod config;
pub mod context;
pub mod http;
pub mod images;
pub mod scanner;
