//! Defines the error types for building, locking and overlaying a DAG.
use crate::expr::EvalError;
use thiserror::Error;

/// Result type alias for DAG operations.
pub type DagResult<T> = Result<T, DagError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DagError {
    // --- Structural identity ---
    #[error("invalid node name '{name}': names must be non-empty and must not contain '#'")]
    InvalidName { name: String },
    #[error("node '{node}' uses unknown distribution '{distribution}'")]
    UnknownDistribution { node: String, distribution: String },
    #[error("node '{node}' has a parameter without a name")]
    MissingParameterName { node: String },
    #[error("node '{node}' declares parameter '{param}' more than once")]
    DuplicateParameter { node: String, param: String },
    #[error("node '{node}' has {orders} order value(s) for {times} time point(s)")]
    OrderLengthMismatch { node: String, orders: usize, times: usize },
    #[error("node '{node}' has order 0; orders start at 1")]
    InvalidOrder { node: String },
    #[error("node name '{name}' is declared more than once")]
    DuplicateName { name: String },
    #[error("node '{node}' has an invalid time reference: {source}")]
    InvalidTimeReference {
        node: String,
        #[source]
        source: EvalError,
    },
    #[error("eager parameter of node '{node}' failed to evaluate: {source}")]
    EagerEvaluation {
        node: String,
        #[source]
        source: EvalError,
    },
    #[error("nodes of '{generic}' disagree on end of follow-up")]
    EndOfFollowUpConflict { generic: String },

    // --- Protocol ---
    #[error("the DAG is locked and can no longer be modified")]
    LockedDag,
    #[error("actions can only be applied to a locked DAG")]
    LockedRequired,
    #[error("not a DAG: {reason}")]
    NotADag { reason: String },

    // --- Sequencing ---
    #[error("node '{node}' has no time but timed node '{existing}' is already defined")]
    TimeOrdering { node: String, existing: String },
    #[error("order conflict: {message}")]
    OrderConflict { message: String },
    #[error("time points must be consecutive from 0; time {missing} is missing")]
    TimeGap { missing: u32 },
    #[error("node '{node}' references '{parent}', which is not ordered before it")]
    ForwardReference { node: String, parent: String },
    #[error("node '{node}' references '{name}', which does not name exactly one node")]
    UnresolvedReference { node: String, name: String },

    // --- Actions ---
    #[error("action name must not be empty")]
    EmptyName,
    #[error("action '{action}' replaces no nodes")]
    MissingNodes { action: String },
    #[error("action attribute '{name}' is unnamed or given more than once")]
    DuplicateAttribute { name: String },
    #[error("no node named '{name}' in the DAG")]
    UnknownNode { name: String },
}
