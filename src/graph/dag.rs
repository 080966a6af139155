//! dag.rs
//! The incremental container of node specs and its assembly rules.

use super::action::Action;
use super::error::{DagError, DagResult};
use super::node::NodeSpec;
use super::node_list::NodeList;
use crate::config::DagOptions;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something the assembly engine did silently on the caller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyNotice {
    /// A node with the same expanded name was replaced in place.
    Replaced { name: String },
    /// A node without a time axis was removed because a time-varying node of
    /// the same generic name was added.
    PromotedToTimeVarying { generic: String, added: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) enum DagState {
    #[default]
    Growable,
    Locked { actions: BTreeMap<String, Action> },
}

/// A structural equation model under construction, or locked for simulation.
///
/// While growable, the node sequence carries provisional positions; after
/// [`Dag::lock`] every node has its final `order` and the sequence is sorted
/// by it. Nodes are shared behind `Arc`, so clones of a locked DAG (and the
/// DAGs returned by [`Dag::apply_action`]) share every untouched node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dag {
    pub(crate) nodes: Vec<Arc<NodeSpec>>,
    pub(crate) state: DagState,
}

impl Dag {
    pub fn new() -> Self { Self::default() }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, DagState::Locked { .. })
    }

    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn nodes(&self) -> &[Arc<NodeSpec>] { &self.nodes }

    pub fn node(&self, expanded_name: &str) -> Option<&Arc<NodeSpec>> {
        self.nodes.iter().find(|n| n.expanded_name() == expanded_name)
    }

    pub fn expanded_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.expanded_name())
    }

    /// Largest time index among timed nodes.
    pub fn max_time(&self) -> Option<u32> {
        self.nodes.iter().filter_map(|n| n.time()).max()
    }

    /// Actions attached to a locked DAG, by name. Empty while growable.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        let actions = match &self.state {
            DagState::Locked { actions } => Some(actions.values()),
            DagState::Growable => None,
        };
        actions.into_iter().flatten()
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        match &self.state {
            DagState::Locked { actions } => actions.get(name),
            DagState::Growable => None,
        }
    }

    /// Adds the nodes of one declaration, one at a time and in order.
    ///
    /// An existing node with the same expanded name is replaced in place. A
    /// time-varying node whose generic name matches an existing node without
    /// a time axis removes that node before being inserted. New nodes go
    /// after the last node of their time block. On error the DAG is left
    /// exactly as it was.
    pub fn add_nodes(
        &mut self,
        list: NodeList,
        options: &DagOptions,
    ) -> DagResult<Vec<AssemblyNotice>> {
        if self.is_locked() {
            return Err(DagError::LockedDag);
        }
        self.check_end_of_follow_up(&list)?;

        let mut nodes = self.nodes.clone();
        let mut notices = Vec::new();

        for node in list {
            let name = node.expanded_name().to_string();

            if let Some(pos) = nodes.iter().position(|n| n.expanded_name() == name) {
                if options.verbose {
                    info!(node = %name, "existing node replaced");
                }
                nodes[pos] = Arc::new(node);
                notices.push(AssemblyNotice::Replaced { name });
                continue;
            }

            let generic = node.generic_name();
            if let Some(pos) = nodes
                .iter()
                .position(|n| n.time().is_none() && n.generic_name() == generic)
            {
                warn!(
                    node = %generic,
                    replacement = %name,
                    "non-time-varying node replaced by a time-varying node"
                );
                nodes.remove(pos);
                notices.push(AssemblyNotice::PromotedToTimeVarying {
                    generic: generic.to_string(),
                    added: name.clone(),
                });
            }

            let at = insertion_index(&nodes, &node)?;
            nodes.insert(at, Arc::new(node));
        }

        self.nodes = nodes;
        Ok(notices)
    }

    /// Nodes sharing a generic name must agree on end of follow-up. Nodes
    /// about to be replaced by `list`, or removed by its promotion to
    /// time-varying, are not held against it.
    fn check_end_of_follow_up(&self, list: &NodeList) -> DagResult<()> {
        let incoming: HashSet<&str> = list.expanded_names().collect();
        for node in list.nodes() {
            let promotes = node.time().is_some();
            let conflict = self.nodes.iter().any(|n| {
                n.generic_name() == node.generic_name()
                    && !incoming.contains(n.expanded_name())
                    && !(promotes && n.time().is_none())
                    && n.is_end_of_follow_up() != node.is_end_of_follow_up()
            });
            if conflict {
                return Err(DagError::EndOfFollowUpConflict {
                    generic: node.generic_name().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Position for a structurally new node.
///
/// Untimed nodes go after the last untimed node and are rejected once any
/// timed node exists. A node at time `T` goes after the last node at `T`,
/// else before the first node later than `T`, else at the end.
fn insertion_index(nodes: &[Arc<NodeSpec>], node: &NodeSpec) -> DagResult<usize> {
    match node.time() {
        None => {
            if let Some(timed) = nodes.iter().find(|n| n.time().is_some()) {
                return Err(DagError::TimeOrdering {
                    node: node.expanded_name().to_string(),
                    existing: timed.expanded_name().to_string(),
                });
            }
            Ok(nodes
                .iter()
                .rposition(|n| n.time().is_none())
                .map_or(0, |i| i + 1))
        }
        Some(t) => {
            if let Some(i) = nodes.iter().rposition(|n| n.time() == Some(t)) {
                return Ok(i + 1);
            }
            if let Some(i) = nodes.iter().position(|n| matches!(n.time(), Some(nt) if nt > t)) {
                return Ok(i);
            }
            debug!(node = %node.expanded_name(), "no node at or after this time; appending");
            Ok(nodes.len())
        }
    }
}
