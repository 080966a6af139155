//! DAG assembly and validation core for structural equation models.
//!
//! A model is a sequence of random variables ("nodes"), each with a
//! distribution and named parameter expressions that may depend on earlier
//! nodes. Declarations are expanded by [`NodeList::builder`], accumulated in a
//! growable [`Dag`] through [`Dag::add_nodes`], finalized by [`Dag::lock`], and
//! overlaid with interventions by [`Dag::apply_action`]. [`compose`] is the
//! single tagged entry point for the last two.
//!
//! ```text
//! NodeList::builder ──> Dag::add_nodes ──> Dag::lock ──> Dag::apply_action
//!   (expand, validate)   (position, merge)   (order, check)  (overlay)
//! ```
//!
//! Sampling is not done here: a simulator walks a locked DAG in ascending
//! order, evaluating each node's [`expr::Expr`] parameters against the
//! values sampled so far (and an action's attributes, if any).

pub mod analysis;
pub mod config;
pub mod display;
pub mod distribution;
pub mod expr;
pub mod graph;
pub mod validation;

pub use config::DagOptions;
pub use distribution::DistributionRegistry;
pub use expr::{Bindings, Expr, Value};
pub use graph::{
    compose, Action, ActionSpec, Addendum, AddendumKind, AssemblyNotice, Dag, DagError,
    DagResult, NodeList, NodeSpec,
};
