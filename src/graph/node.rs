//! Defines the `NodeSpec`, the description of a single scalar random
//! variable in a structural equation model.

use crate::expr::{expanded_name, Expr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One named parameter of a node's distribution, kept unevaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub expr: Expr,
}

/// An immutable node declaration.
///
/// A node is identified inside a DAG by its expanded name: the generic name
/// alone for nodes without a time axis, `generic#t` otherwise. Specs are never
/// mutated once built; overwriting a node replaces the whole spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    generic_name: String,
    time: Option<u32>,
    expanded_name: String,
    distribution: String,
    params: Vec<Param>,
    order: Option<u32>,
    end_of_follow_up: Option<bool>,
}

impl NodeSpec {
    /// Callers are expected to have validated names and parameters; the
    /// public way in is `NodeList::builder`.
    pub(crate) fn new(
        generic_name: String,
        time: Option<u32>,
        distribution: String,
        params: Vec<Param>,
        order: Option<u32>,
        end_of_follow_up: Option<bool>,
    ) -> Self {
        let expanded_name = expanded_name(&generic_name, time);
        Self {
            generic_name,
            time,
            expanded_name,
            distribution,
            params,
            order,
            end_of_follow_up,
        }
    }

    pub fn generic_name(&self) -> &str { &self.generic_name }
    pub fn time(&self) -> Option<u32> { self.time }
    pub fn expanded_name(&self) -> &str { &self.expanded_name }
    pub fn distribution(&self) -> &str { &self.distribution }
    pub fn params(&self) -> &[Param] { &self.params }
    pub fn order(&self) -> Option<u32> { self.order }
    pub fn end_of_follow_up(&self) -> Option<bool> { self.end_of_follow_up }

    /// The end-of-follow-up flag with "unset" read as `false`.
    pub fn is_end_of_follow_up(&self) -> bool {
        self.end_of_follow_up.unwrap_or(false)
    }

    pub fn param(&self, name: &str) -> Option<&Expr> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.expr)
    }

    /// Every name referenced by any parameter expression.
    pub fn references(&self) -> BTreeSet<String> {
        self.params.iter().flat_map(|p| p.expr.references()).collect()
    }

    pub(crate) fn with_order(&self, order: u32) -> Self {
        Self { order: Some(order), ..self.clone() }
    }

    pub(crate) fn with_end_of_follow_up(&self, flag: Option<bool>) -> Self {
        Self { end_of_follow_up: flag, ..self.clone() }
    }
}
