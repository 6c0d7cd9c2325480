//! Resource model: identities, declarations, and the catalog arena.
//!
//! ## Submodules
//!
//! - [`resource`]: `Type[title]` identities, arena ids, relationship kinds.
//! - [`catalog`]: the ordered resource table handed to a transaction.
//! - [`document`]: TOML/JSON serialization of a compiled catalog.

pub mod catalog;
pub mod document;
pub mod resource;

pub use catalog::{Catalog, CatalogRelationship, ResourceDecl};
pub use document::{CatalogDocument, DocumentError, load_catalog};
pub use resource::{RelationKind, Relationship, Resource, ResourceId, ResourceRef};
