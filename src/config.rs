//! Options threaded explicitly through assembly and locking.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DagOptions {
    /// Log in-place node replacements at `info` level. Promotions of a
    /// non-time-varying node are always logged at `warn`.
    pub verbose: bool,
}

impl DagOptions {
    pub fn verbose() -> Self {
        Self { verbose: true }
    }

    /// Reads options from a JSON object; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
