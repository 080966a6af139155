//! Single entry point for extending a model with nodes or actions.

use super::action::ActionSpec;
use super::dag::Dag;
use super::error::DagResult;
use super::node_list::NodeList;
use crate::config::DagOptions;
use std::fmt;

/// What is being added to a model.
#[derive(Debug, Clone)]
pub enum Addendum {
    /// New or replacement nodes for a growable DAG.
    Nodes(NodeList),
    /// An intervention on a locked DAG.
    Action(ActionSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddendumKind {
    Nodes,
    Action,
}

impl Addendum {
    pub fn kind(&self) -> AddendumKind {
        match self {
            Addendum::Nodes(_) => AddendumKind::Nodes,
            Addendum::Action(_) => AddendumKind::Action,
        }
    }
}

impl fmt::Display for AddendumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddendumKind::Nodes => write!(f, "nodes"),
            AddendumKind::Action => write!(f, "action"),
        }
    }
}

impl From<NodeList> for Addendum {
    fn from(list: NodeList) -> Self {
        Addendum::Nodes(list)
    }
}

impl From<ActionSpec> for Addendum {
    fn from(spec: ActionSpec) -> Self {
        Addendum::Action(spec)
    }
}

/// Returns `base` extended by `addendum`; `base` itself is never modified.
///
/// Nodes require a growable DAG, actions a locked one. Assembly notices are
/// logged, not returned; call [`Dag::add_nodes`] directly to inspect them.
pub fn compose(base: &Dag, addendum: impl Into<Addendum>, options: &DagOptions) -> DagResult<Dag> {
    match addendum.into() {
        Addendum::Nodes(list) => {
            let mut dag = base.clone();
            dag.add_nodes(list, options)?;
            Ok(dag)
        }
        Addendum::Action(spec) => base.apply_action(spec),
    }
}
