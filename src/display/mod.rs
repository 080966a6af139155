//! Human-readable renderings of a DAG.
pub mod trace;
