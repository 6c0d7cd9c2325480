pub mod apply;
pub mod check;
pub mod completions;
pub mod graph;

use std::path::Path;

use anyhow::{Context, Result};
use ordo_core::model::{Catalog, load_catalog};

/// Load a catalog document, naming the file on failure.
pub fn read_catalog(path: &Path) -> Result<Catalog> {
    load_catalog(path).with_context(|| format!("cannot load catalog {}", path.display()))
}
