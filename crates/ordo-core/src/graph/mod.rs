//! Graph-level processing of a catalog.
//!
//! ## Submodules
//!
//! - [`build`]: Relationship graph construction, edge metadata, DOT output.
//! - [`containment`]: Containment forest and relationship expansion through
//!   containers.
//! - [`cycles`]: Ordering-cycle detection and reporting.

pub mod build;
pub mod containment;
pub mod cycles;

pub use build::{EdgeInfo, EdgeKind, EdgeOrigin, GraphEdge, RelationshipGraph};
pub use containment::{Containment, ExpansionStats, expand};
pub use cycles::{CycleReport, find_cycles, is_acyclic};
