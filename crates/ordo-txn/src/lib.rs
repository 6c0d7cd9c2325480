#![forbid(unsafe_code)]
//! ordo-txn library.
//!
//! Drives one catalog through graph construction, containment expansion and
//! cycle detection, then evaluates every resource in dependency order.
//!
//! ```rust,ignore
//! use ordo_txn::{ScriptedEvaluator, Transaction, TransactionConfig};
//!
//! let mut txn = Transaction::new(catalog, TransactionConfig::default())?;
//! let report = txn.evaluate(&mut ScriptedEvaluator::new())?;
//! println!("{report}");
//! ```

pub mod check;
pub mod error;
pub mod evaluate;
pub mod report;
pub mod trace;
pub mod transaction;

pub use error::TransactionError;
pub use evaluate::{CancelToken, EvalCall, EvalContext, Evaluator, Outcome, ScriptedEvaluator};
pub use report::{RunStatus, StatusCounts, TransactionReport};
pub use trace::{ExecutionTrace, ResourceStatus, SkipReason, TraceEntry};
pub use transaction::{Transaction, TransactionConfig, TransactionState};
