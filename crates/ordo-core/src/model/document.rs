//! Serialized catalog documents (TOML or JSON).
//!
//! A catalog document is the already-compiled output of a manifest: a flat
//! list of resources and chained relationships. It is a data format, not a
//! configuration language.
//!
//! ```toml
//! [[resource]]
//! name = "Notify[foo]"
//! container = "Class[Foo]"
//! require = ["Class[Bar]"]
//!
//! [[relationship]]
//! source = "Class[Foo]"
//! kind = "before"
//! target = "Class[Baz]"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{CatalogError, ErrorCode};

use super::catalog::{Catalog, ResourceDecl};
use super::resource::{RelationKind, ResourceRef};

/// Errors raised while reading a catalog document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// TOML syntax or schema error.
    #[error("invalid TOML catalog: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or schema error.
    #[error("invalid JSON catalog: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but describes a malformed catalog.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl DocumentError {
    /// Map this error to its stable [`ErrorCode`].
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } | Self::Toml(_) | Self::Json(_) => ErrorCode::DocumentParseError,
            Self::Catalog(inner) => inner.error_code(),
        }
    }
}

/// On-disk encoding of a catalog document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Json,
}

impl DocumentFormat {
    /// Pick a format from a file extension; anything but `.json` is TOML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// One `[[resource]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub name: ResourceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ResourceRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notify: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscribe: Vec<ResourceRef>,
}

/// One `[[relationship]]` entry (a chained arrow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEntry {
    pub source: ResourceRef,
    pub kind: RelationKind,
    pub target: ResourceRef,
}

/// A whole catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceEntry>,
    #[serde(default, rename = "relationship")]
    pub relationships: Vec<RelationshipEntry>,
}

impl CatalogDocument {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Toml`] on syntax or schema errors.
    pub fn from_toml_str(content: &str) -> Result<Self, DocumentError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] on syntax or schema errors.
    pub fn from_json_str(content: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Convert the document into a [`Catalog`], preserving entry order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateResource`] if two entries share a name.
    pub fn into_catalog(self) -> Result<Catalog, CatalogError> {
        let mut catalog = Catalog::new();

        for entry in self.resources {
            let mut decl = ResourceDecl::new(entry.name);
            decl.container = entry.container;
            let groups = [
                (RelationKind::Before, entry.before),
                (RelationKind::Require, entry.require),
                (RelationKind::Notify, entry.notify),
                (RelationKind::Subscribe, entry.subscribe),
            ];
            for (kind, targets) in groups {
                for target in targets {
                    decl = decl.relate(kind, target);
                }
            }
            catalog.add_resource(decl)?;
        }

        for rel in self.relationships {
            catalog.add_relationship(rel.source, rel.kind, rel.target);
        }

        Ok(catalog)
    }
}

/// Read and convert a catalog document from disk.
///
/// # Errors
///
/// Returns [`DocumentError`] if the file cannot be read or parsed, or
/// describes a malformed catalog.
#[instrument]
pub fn load_catalog(path: &Path) -> Result<Catalog, DocumentError> {
    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let document = match DocumentFormat::from_path(path) {
        DocumentFormat::Json => CatalogDocument::from_json_str(&content)?,
        DocumentFormat::Toml => CatalogDocument::from_toml_str(&content)?,
    };

    let catalog = document.into_catalog()?;
    tracing::debug!(
        resources = catalog.len(),
        relationships = catalog.relationships().len(),
        "loaded catalog document"
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[resource]]
name = "Class[Foo]"

[[resource]]
name = "Notify[foo]"
container = "Class[Foo]"
require = ["Class[Bar]"]
notify = ["Service[web]"]

[[relationship]]
source = "Class[Foo]"
kind = "before"
target = "Class[Baz]"
"#;

    #[test]
    fn toml_document_converts_in_order() {
        let doc = CatalogDocument::from_toml_str(SAMPLE).expect("parse");
        assert_eq!(doc.resources.len(), 2);

        let catalog = doc.into_catalog().expect("convert");
        let names: Vec<String> = catalog.resources().iter().map(ToString::to_string).collect();
        assert_eq!(names, ["Class[Foo]", "Notify[foo]"]);

        let foo = catalog
            .get_by_name(&ResourceRef::new("notify", "foo"))
            .expect("notify present");
        assert_eq!(foo.container(), Some(&ResourceRef::new("class", "Foo")));
        assert_eq!(foo.relationships().len(), 2);
        assert_eq!(foo.relationships()[0].kind, RelationKind::Require);
        assert_eq!(foo.relationships()[1].kind, RelationKind::Notify);
        assert_eq!(catalog.relationships().len(), 1);
    }

    #[test]
    fn json_document_parses() {
        let json = r#"{
            "resource": [{"name": "Notify[a]", "before": ["Notify[b]"]}, {"name": "Notify[b]"}],
            "relationship": [{"source": "Notify[b]", "kind": "notify", "target": "Notify[a]"}]
        }"#;
        let catalog = CatalogDocument::from_json_str(json)
            .expect("parse")
            .into_catalog()
            .expect("convert");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.relationships()[0].kind, RelationKind::Notify);
    }

    #[test]
    fn malformed_reference_is_a_parse_error() {
        let err = CatalogDocument::from_toml_str("[[resource]]\nname = \"nope\"\n")
            .expect_err("invalid ref");
        assert_eq!(err.error_code(), ErrorCode::DocumentParseError);
    }

    #[test]
    fn duplicate_entries_surface_catalog_error() {
        let doc = CatalogDocument::from_toml_str(
            "[[resource]]\nname = \"Notify[a]\"\n[[resource]]\nname = \"Notify[a]\"\n",
        )
        .expect("parse");
        let err = doc.into_catalog().expect_err("duplicate");
        assert!(matches!(err, CatalogError::DuplicateResource(_)));
    }

    #[test]
    fn load_catalog_picks_format_from_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("site.toml");
        std::fs::write(&path, SAMPLE).expect("write");
        let catalog = load_catalog(&path).expect("load");
        assert_eq!(catalog.len(), 2);

        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a")), DocumentFormat::Toml);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_catalog(Path::new("/nonexistent/catalog.toml")).expect_err("missing");
        assert!(err.to_string().contains("/nonexistent/catalog.toml"));
    }
}
