//! Named, non-destructive reparametrizations of a locked DAG.

use super::dag::{Dag, DagState};
use super::error::{DagError, DagResult};
use super::node::NodeSpec;
use super::node_list::NodeList;
use crate::expr::{Bindings, Value};
use crate::validation::rules::references::ReferenceIndex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// The caller's request for an action: replacement nodes plus extra
/// attributes. Validated by [`Dag::apply_action`].
#[derive(Debug, Clone, Default)]
pub struct ActionSpec {
    name: String,
    nodes: Vec<NodeSpec>,
    attributes: Vec<(String, Value)>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn nodes(mut self, list: NodeList) -> Self {
        self.nodes.extend(list);
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }
}

/// An intervention attached to a locked DAG.
///
/// Only the replaced nodes differ from the base; every other node is read
/// from the base DAG as is.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    name: String,
    replacements: BTreeMap<String, Arc<NodeSpec>>,
    attributes: BTreeMap<String, Value>,
}

impl Action {
    fn new(name: String) -> Self {
        Self { name, replacements: BTreeMap::new(), attributes: BTreeMap::new() }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn replacements(&self) -> impl Iterator<Item = &Arc<NodeSpec>> {
        self.replacements.values()
    }

    pub fn replacement(&self, expanded_name: &str) -> Option<&Arc<NodeSpec>> {
        self.replacements.get(expanded_name)
    }

    /// Values visible only to this action's replaced formulas.
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// The node sequence of `base` as seen under this action, in order.
    pub fn nodes<'a>(&'a self, base: &'a Dag) -> impl Iterator<Item = &'a Arc<NodeSpec>> + 'a {
        base.nodes()
            .iter()
            .map(move |n| self.replacements.get(n.expanded_name()).unwrap_or(n))
    }
}

impl Bindings for Action {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }
}

impl Dag {
    /// Attaches (or updates) the action `spec.name` and returns the result as
    /// a new locked DAG. The base DAG and its nodes are not modified.
    ///
    /// Replacements must name nodes that already exist; they take over the
    /// replaced node's order, and its end-of-follow-up flag when they leave
    /// theirs unset. Applying an existing action name merges into it, with
    /// the newer replacements and attributes winning.
    pub fn apply_action(&self, spec: ActionSpec) -> DagResult<Dag> {
        let DagState::Locked { actions } = &self.state else {
            return Err(DagError::LockedRequired);
        };
        if spec.name.trim().is_empty() {
            return Err(DagError::EmptyName);
        }
        if spec.nodes.is_empty() {
            return Err(DagError::MissingNodes { action: spec.name });
        }

        let mut attribute_names = HashSet::new();
        for (name, _) in &spec.attributes {
            if name.trim().is_empty() || !attribute_names.insert(name.as_str()) {
                return Err(DagError::DuplicateAttribute { name: name.clone() });
            }
        }

        let mut action = actions
            .get(&spec.name)
            .cloned()
            .unwrap_or_else(|| Action::new(spec.name.clone()));
        action.attributes.extend(spec.attributes);

        let index = ReferenceIndex::new(&self.nodes);
        let mut replacements = Vec::with_capacity(spec.nodes.len());
        for node in spec.nodes {
            let base = self.node(node.expanded_name()).ok_or_else(|| DagError::UnknownNode {
                name: node.expanded_name().to_string(),
            })?;
            let order = base.order().ok_or_else(|| DagError::OrderConflict {
                message: format!("locked node '{}' has no order", base.expanded_name()),
            })?;
            index.check(&node, order, |name| action.attributes.contains_key(name))?;

            let efu = node.end_of_follow_up().or(base.end_of_follow_up());
            replacements.push(Arc::new(node.with_order(order).with_end_of_follow_up(efu)));
        }
        for node in replacements {
            action.replacements.insert(node.expanded_name().to_string(), node);
        }

        debug!(action = %action.name, replaced = action.replacements.len(), "action applied");

        let mut actions = actions.clone();
        actions.insert(action.name.clone(), action);
        Ok(Dag {
            nodes: self.nodes.clone(),
            state: DagState::Locked { actions },
        })
    }
}
