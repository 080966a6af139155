use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sampling procedures shipped with every registry.
pub const DEFAULT_DISTRIBUTIONS: &[&str] = &[
    "rbern",
    "rnorm",
    "runif",
    "rpois",
    "rcat.b0",
    "rcat.b1",
    "rconst",
];

/// The set of distribution identifiers that resolve to a sampling procedure.
///
/// Node declarations are checked against it; the sampling code itself lives
/// with the simulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionRegistry {
    known: BTreeSet<String>,
}

impl DistributionRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for name in DEFAULT_DISTRIBUTIONS {
            registry.register(*name);
        }
        registry
    }

    /// Registers a user-defined sampler name. Returns `false` if it was
    /// already known.
    pub fn register(&mut self, name: impl Into<String>) -> bool {
        self.known.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }

    pub fn count(&self) -> usize { self.known.len() }
}
