//! Validation rule for parent references in parameter expressions.

use crate::expr::split_expanded_name;
use crate::graph::{DagError, DagResult, NodeSpec};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Name lookups over an ordered node sequence.
pub(crate) struct ReferenceIndex<'a> {
    orders: HashMap<&'a str, u32>,
    generics: HashSet<&'a str>,
    time_varying: HashSet<&'a str>,
}

impl<'a> ReferenceIndex<'a> {
    pub(crate) fn new(nodes: &'a [Arc<NodeSpec>]) -> Self {
        let mut orders = HashMap::with_capacity(nodes.len());
        let mut generics = HashSet::with_capacity(nodes.len());
        let mut time_varying = HashSet::new();
        for node in nodes {
            generics.insert(node.generic_name());
            if let Some(order) = node.order() {
                orders.insert(node.expanded_name(), order);
            }
            if node.time().is_some() {
                time_varying.insert(node.generic_name());
            }
        }
        Self { orders, generics, time_varying }
    }

    /// "The Causality Rule": parents must be sampled strictly before the node.
    ///
    /// A reference to a node's expanded name is a parent. A bare generic name
    /// of a time-varying node cannot be resolved to a single parent, and
    /// neither can `generic#t` when no node exists at time `t`. Any other
    /// name binds outside the graph (action attributes, scope values) unless
    /// `is_external` says otherwise.
    pub(crate) fn check(
        &self,
        node: &NodeSpec,
        own_order: u32,
        is_external: impl Fn(&str) -> bool,
    ) -> DagResult<()> {
        for name in node.references() {
            if is_external(&name) {
                continue;
            }
            match self.orders.get(name.as_str()) {
                Some(&parent_order) if parent_order >= own_order => {
                    return Err(DagError::ForwardReference {
                        node: node.expanded_name().to_string(),
                        parent: name,
                    });
                }
                Some(_) => {}
                None if self.is_dangling(&name) => {
                    return Err(DagError::UnresolvedReference {
                        node: node.expanded_name().to_string(),
                        name,
                    });
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Names that can only mean a node, but match none.
    fn is_dangling(&self, name: &str) -> bool {
        match split_expanded_name(name) {
            (generic, Some(_)) => self.generics.contains(generic),
            (generic, None) => self.time_varying.contains(generic),
        }
    }
}

/// Checks every node of a locked sequence against its own order.
pub(crate) fn validate_references(nodes: &[Arc<NodeSpec>]) -> DagResult<()> {
    let index = ReferenceIndex::new(nodes);
    for node in nodes {
        let own = node.order().unwrap_or(0);
        index.check(node, own, |_| false)?;
    }
    Ok(())
}
