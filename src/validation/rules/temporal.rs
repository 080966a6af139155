//! Validation rules for the time axis.

use crate::graph::{DagError, DagResult, NodeSpec};
use std::collections::BTreeSet;
use std::sync::Arc;

/// "The Calendar Rule": time strictly orders blocks of nodes.
///
/// `nodes` must be sorted by order. Any timed node ordered after a node with
/// a later time violates it. Untimed nodes are not constrained here.
pub(crate) fn validate_time_blocks(nodes: &[Arc<NodeSpec>]) -> DagResult<()> {
    let mut latest: Option<(u32, &str)> = None;
    for node in nodes {
        let Some(t) = node.time() else { continue };
        match latest {
            Some((seen, name)) if t < seen => {
                return Err(DagError::OrderConflict {
                    message: format!(
                        "node '{}' at time {} is ordered after '{}' at time {}",
                        node.expanded_name(),
                        t,
                        name,
                        seen
                    ),
                });
            }
            Some((seen, _)) if t == seen => {}
            _ => latest = Some((t, node.expanded_name())),
        }
    }
    Ok(())
}

/// Distinct time points must be exactly `0..=max`.
pub(crate) fn validate_time_gaps(nodes: &[Arc<NodeSpec>]) -> DagResult<()> {
    let times: BTreeSet<u32> = nodes.iter().filter_map(|n| n.time()).collect();
    for (expected, t) in (0u32..).zip(times) {
        if t != expected {
            return Err(DagError::TimeGap { missing: expected });
        }
    }
    Ok(())
}
