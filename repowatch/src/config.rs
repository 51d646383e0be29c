//! Engine limits

use serde::{Deserialize, Serialize};

/// Maximum number of change records returned per scope and run.
pub const DEFAULT_FEED_CAP: usize = 30;
/// Length of the "latest by version" projection.
pub const DEFAULT_LATEST_LIMIT: usize = 20;
/// Length of the "largest by size" projection.
pub const DEFAULT_LARGEST_LIMIT: usize = 10;
/// Description length kept in display projections, in characters.
pub const DEFAULT_DESCRIPTION_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub feed_cap: usize,
    pub latest_limit: usize,
    pub largest_limit: usize,
    pub description_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feed_cap: DEFAULT_FEED_CAP,
            latest_limit: DEFAULT_LATEST_LIMIT,
            largest_limit: DEFAULT_LARGEST_LIMIT,
            description_limit: DEFAULT_DESCRIPTION_LIMIT,
        }
    }
}
