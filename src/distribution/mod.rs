//! Known sampling procedures, by identifier.
pub mod registry;

pub use registry::{DistributionRegistry, DEFAULT_DISTRIBUTIONS};
