//! Defines the core data structures of a structural equation model and the
//! operations that assemble, lock and overlay it.
pub mod action;
pub mod compose;
pub mod dag;
pub mod error;
mod lock;
pub mod node;
pub mod node_list;

// Re-export key types for convenient access
pub use action::{Action, ActionSpec};
pub use compose::{compose, Addendum, AddendumKind};
pub use dag::{AssemblyNotice, Dag};
pub use error::{DagError, DagResult};
pub use node::{NodeSpec, Param};
pub use node_list::{NodeList, NodeListBuilder};
