use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Tunables of the traversal engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshConfig {
    /// Timeout of a ping. Body-returning calls get four times this, since
    /// the callee recurses before answering.
    pub base_timeout: Duration,
    /// Outbound calls one sweep may have open at once.
    pub max_in_flight: usize,
}

impl MeshConfig {
    pub fn with_timeout(base_timeout: Duration) -> Self {
        Self {
            base_timeout,
            ..Self::default()
        }
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            base_timeout: DEFAULT_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}
