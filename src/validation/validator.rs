//! The central validator that runs every lock-time rule over a DAG.
use super::rules::{ordering, references, temporal};
use crate::graph::{DagResult, NodeSpec};
use std::sync::Arc;

/// The lock-time gate for a node sequence.
///
/// Expects the nodes sorted by their (resolved) order. Rules run from the
/// most structural to the most local, and the first violation is returned:
/// a sequence that fails ordering cannot be meaningfully checked for parent
/// references.
pub struct Validator<'a> {
    nodes: &'a [Arc<NodeSpec>],
}

impl<'a> Validator<'a> {
    pub fn new(nodes: &'a [Arc<NodeSpec>]) -> Self {
        Self { nodes }
    }

    pub fn validate(&self) -> DagResult<()> {
        ordering::validate_orders(self.nodes)?;
        temporal::validate_time_blocks(self.nodes)?;
        temporal::validate_time_gaps(self.nodes)?;
        references::validate_references(self.nodes)?;
        Ok(())
    }
}
