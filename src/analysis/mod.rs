//! Read-only analyses over locked DAGs: parent lookup and dependency graphs.
pub mod topology;
