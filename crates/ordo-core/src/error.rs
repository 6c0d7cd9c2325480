use std::fmt;

use crate::model::ResourceRef;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    DocumentParseError,
    InvalidResourceRef,
    DuplicateResource,
    UnknownResource,
    UnknownContainer,
    ContainmentConflict,
    ContainmentCycle,
    DependencyCycle,
    AlreadyEvaluated,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::DocumentParseError => "E1002",
            Self::InvalidResourceRef => "E2001",
            Self::DuplicateResource => "E2002",
            Self::UnknownResource => "E2003",
            Self::UnknownContainer => "E2004",
            Self::ContainmentConflict => "E2005",
            Self::ContainmentCycle => "E2006",
            Self::DependencyCycle => "E3001",
            Self::AlreadyEvaluated => "E3002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::DocumentParseError => "Catalog document parse error",
            Self::InvalidResourceRef => "Invalid resource reference",
            Self::DuplicateResource => "Duplicate resource declaration",
            Self::UnknownResource => "Relationship references an unknown resource",
            Self::UnknownContainer => "Container references an unknown resource",
            Self::ContainmentConflict => "Resource already has a different container",
            Self::ContainmentCycle => "Containment cycle",
            Self::DependencyCycle => "Dependency cycle",
            Self::AlreadyEvaluated => "Transaction already evaluated",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .ordo/config.toml and retry."),
            Self::DocumentParseError => {
                Some("Check the catalog document against the documented resource schema.")
            }
            Self::InvalidResourceRef => Some("Write references as Type[title], e.g. Notify[foo]."),
            Self::DuplicateResource => Some("Declare each Type[title] exactly once per catalog."),
            Self::UnknownResource | Self::UnknownContainer => {
                Some("Declare the referenced resource or fix the reference.")
            }
            Self::ContainmentConflict => {
                Some("A resource may be contained by a single container only.")
            }
            Self::ContainmentCycle => Some("A container cannot contain itself or its ancestors."),
            Self::DependencyCycle => {
                Some("Remove/adjust relationships to keep the graph acyclic.")
            }
            Self::AlreadyEvaluated => Some("Build a new transaction for each run."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Fatal configuration errors: the catalog is malformed and no transaction
/// can be built from it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// A string could not be parsed as `Type[title]`.
    #[error("invalid resource reference '{0}': expected Type[title]")]
    InvalidResourceRef(String),

    /// The same `Type[title]` was declared twice.
    #[error("duplicate declaration of {0}")]
    DuplicateResource(ResourceRef),

    /// A relationship names a resource that is not in the catalog.
    #[error("{declared_by} has a relationship with unknown resource {reference}")]
    UnknownResource {
        /// The missing reference.
        reference: ResourceRef,
        /// The resource (or chained relationship source) that declared it.
        declared_by: ResourceRef,
    },

    /// A containment assignment names a container that is not in the catalog.
    #[error("{member} is contained by unknown resource {container}")]
    UnknownContainer {
        /// The contained resource.
        member: ResourceRef,
        /// The missing container.
        container: ResourceRef,
    },

    /// A resource was assigned a second, different container.
    #[error("{member} is already contained by {existing}; cannot also be contained by {requested}")]
    ContainmentConflict {
        /// The contained resource.
        member: ResourceRef,
        /// The container assigned first.
        existing: ResourceRef,
        /// The rejected container.
        requested: ResourceRef,
    },

    /// Following container links from a resource leads back to it.
    #[error("containment cycle: {}", join_refs(.members))]
    ContainmentCycle {
        /// The chain of resources forming the cycle, starting and ending on
        /// the same resource.
        members: Vec<ResourceRef>,
    },
}

impl CatalogError {
    /// Map this error to its stable [`ErrorCode`].
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidResourceRef(_) => ErrorCode::InvalidResourceRef,
            Self::DuplicateResource(_) => ErrorCode::DuplicateResource,
            Self::UnknownResource { .. } => ErrorCode::UnknownResource,
            Self::UnknownContainer { .. } => ErrorCode::UnknownContainer,
            Self::ContainmentConflict { .. } => ErrorCode::ContainmentConflict,
            Self::ContainmentCycle { .. } => ErrorCode::ContainmentCycle,
        }
    }
}

fn join_refs(refs: &[ResourceRef]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" → ")
}
