use ordo_core::graph::CycleReport;
use ordo_core::{CatalogError, ErrorCode};

/// Errors that stop a transaction before any resource is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    /// The catalog is malformed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The expanded graph contains at least one ordering cycle.
    #[error("dependency cycle: {}", describe(.cycles))]
    DependencyCycle {
        /// One report per strongly connected component.
        cycles: Vec<CycleReport>,
    },

    /// `evaluate` was called on a transaction that already ran.
    #[error("transaction has already been evaluated")]
    AlreadyEvaluated,
}

impl TransactionError {
    /// Map this error to its stable [`ErrorCode`].
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Catalog(inner) => inner.error_code(),
            Self::DependencyCycle { .. } => ErrorCode::DependencyCycle,
            Self::AlreadyEvaluated => ErrorCode::AlreadyEvaluated,
        }
    }
}

fn describe(cycles: &[CycleReport]) -> String {
    cycles
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
