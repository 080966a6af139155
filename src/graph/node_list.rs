//! Expands one node declaration into a list of `NodeSpec`s, one per time point.

use super::error::{DagError, DagResult};
use super::node::{NodeSpec, Param};
use crate::distribution::DistributionRegistry;
use crate::expr::{Bindings, Expr, TIME_SEPARATOR};
use std::collections::HashSet;

/// The specs produced by a single declaration, all sharing one generic name.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeList {
    nodes: Vec<NodeSpec>,
}

impl NodeList {
    pub fn builder(name: impl Into<String>, distribution: impl Into<String>) -> NodeListBuilder {
        NodeListBuilder {
            name: name.into(),
            distribution: distribution.into(),
            params: Vec::new(),
            times: Vec::new(),
            orders: Vec::new(),
            end_of_follow_up: None,
        }
    }

    pub fn nodes(&self) -> &[NodeSpec] { &self.nodes }
    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn expanded_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(NodeSpec::expanded_name)
    }
}

impl IntoIterator for NodeList {
    type Item = NodeSpec;
    type IntoIter = std::vec::IntoIter<NodeSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

/// Collects a node declaration. Nothing is validated until [`build`].
///
/// [`build`]: NodeListBuilder::build
#[derive(Debug, Clone)]
pub struct NodeListBuilder {
    name: String,
    distribution: String,
    params: Vec<Param>,
    times: Vec<u32>,
    orders: Vec<u32>,
    end_of_follow_up: Option<bool>,
}

impl NodeListBuilder {
    pub fn param(mut self, name: impl Into<String>, expr: impl Into<Expr>) -> Self {
        self.params.push(Param { name: name.into(), expr: expr.into() });
        self
    }

    /// Time points to expand over. No time points means a node without a
    /// time axis.
    pub fn times(mut self, times: impl IntoIterator<Item = u32>) -> Self {
        self.times = times.into_iter().collect();
        self
    }

    pub fn order(mut self, order: u32) -> Self {
        self.orders = vec![order];
        self
    }

    /// One order per time point, taken positionally.
    pub fn orders(mut self, orders: impl IntoIterator<Item = u32>) -> Self {
        self.orders = orders.into_iter().collect();
        self
    }

    pub fn end_of_follow_up(mut self, flag: bool) -> Self {
        self.end_of_follow_up = Some(flag);
        self
    }

    /// Validates the declaration and expands it.
    ///
    /// `scope` binds the variables of `Expr::Eager` markers, which are
    /// replaced by their value here; all other sub-expressions stay deferred.
    pub fn build(
        self,
        registry: &DistributionRegistry,
        scope: &dyn Bindings,
    ) -> DagResult<NodeList> {
        let name = self.name;

        if name.is_empty() || name.contains(TIME_SEPARATOR) {
            return Err(DagError::InvalidName { name });
        }
        if !registry.contains(&self.distribution) {
            return Err(DagError::UnknownDistribution { node: name, distribution: self.distribution });
        }

        let mut seen = HashSet::new();
        for p in &self.params {
            if p.name.trim().is_empty() {
                return Err(DagError::MissingParameterName { node: name });
            }
            if !seen.insert(p.name.as_str()) {
                return Err(DagError::DuplicateParameter { node: name.clone(), param: p.name.clone() });
            }
        }

        if self.orders.contains(&0) {
            return Err(DagError::InvalidOrder { node: name });
        }
        let slots = self.times.len().max(1);
        if !self.orders.is_empty() && self.orders.len() != slots {
            return Err(DagError::OrderLengthMismatch {
                node: name,
                orders: self.orders.len(),
                times: self.times.len(),
            });
        }

        // Eager markers bind against the declaration scope, once for all time points.
        let params = self
            .params
            .into_iter()
            .map(|p| {
                p.expr
                    .resolve_eager(scope)
                    .map(|expr| Param { name: p.name, expr })
                    .map_err(|source| DagError::EagerEvaluation { node: name.clone(), source })
            })
            .collect::<DagResult<Vec<_>>>()?;

        let time_points: Vec<Option<u32>> = if self.times.is_empty() {
            vec![None]
        } else {
            self.times.iter().copied().map(Some).collect()
        };

        let mut nodes = Vec::with_capacity(time_points.len());
        for (i, time) in time_points.into_iter().enumerate() {
            let node_params = params
                .iter()
                .map(|p| {
                    p.expr
                        .clone()
                        .resolve_time(time)
                        .map(|expr| Param { name: p.name.clone(), expr })
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| DagError::InvalidTimeReference {
                    node: crate::expr::expanded_name(&name, time),
                    source,
                })?;

            nodes.push(NodeSpec::new(
                name.clone(),
                time,
                self.distribution.clone(),
                node_params,
                self.orders.get(i).copied(),
                self.end_of_follow_up,
            ));
        }

        let mut expanded = HashSet::new();
        for node in &nodes {
            if !expanded.insert(node.expanded_name()) {
                return Err(DagError::DuplicateName { name: node.expanded_name().to_string() });
            }
        }

        Ok(NodeList { nodes })
    }
}
