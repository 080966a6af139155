//! Validation rule for the global sampling order.

use crate::graph::{DagError, DagResult, NodeSpec};
use std::collections::HashMap;
use std::sync::Arc;

/// "The Roll Call Rule": orders must be exactly `1..=N`, one per node.
///
/// Duplicated explicit orders and explicit orders past the node count both
/// leave a gap somewhere in `1..=N`, so either is reported as a conflict.
pub(crate) fn validate_orders(nodes: &[Arc<NodeSpec>]) -> DagResult<()> {
    let n = nodes.len() as u32;
    let mut owners: HashMap<u32, &str> = HashMap::with_capacity(nodes.len());

    for node in nodes {
        let order = node.order().ok_or_else(|| DagError::OrderConflict {
            message: format!("node '{}' has no order", node.expanded_name()),
        })?;
        if order == 0 || order > n {
            return Err(DagError::OrderConflict {
                message: format!(
                    "order {} of node '{}' is outside 1..={}",
                    order,
                    node.expanded_name(),
                    n
                ),
            });
        }
        if let Some(other) = owners.insert(order, node.expanded_name()) {
            return Err(DagError::OrderConflict {
                message: format!(
                    "nodes '{}' and '{}' share order {}",
                    other,
                    node.expanded_name(),
                    order
                ),
            });
        }
    }
    Ok(())
}
