#![forbid(unsafe_code)]
//! ordo-core library.
//!
//! Resource model, relationship graph construction, containment expansion
//! and cycle detection for configuration catalogs.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums in library code, each mapping to an
//!   [`error::ErrorCode`]; `anyhow::Result` only for config file loading.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`) and
//!   `#[instrument]` on the graph passes.

pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod timing;

pub use error::{CatalogError, ErrorCode};
