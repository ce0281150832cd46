use std::time::Duration;

use vigil_camera::{BackendPreference, RetryPolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// newly captured frames between two inference runs
    pub stride: u32,
    /// sleep when a loop has nothing to do
    pub idle_sleep: Duration,
    /// shared deadline for joining every worker at shutdown
    pub join_timeout: Duration,
    pub rate_window: Duration,
    /// warning zone starts at `zone_ratio * width`
    pub zone_ratio: f32,
    /// how long the display waits for input each tick
    pub poll_wait: Duration,
    /// how long the "Saving..." frame stays up after quit
    pub farewell_hold: Duration,
    pub retry: RetryPolicy,
    pub backends: BackendPreference,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stride: 3,
            idle_sleep: Duration::from_millis(1),
            join_timeout: Duration::from_secs(1),
            rate_window: Duration::from_secs(1),
            zone_ratio: 0.8,
            poll_wait: Duration::from_millis(1),
            farewell_hold: Duration::from_millis(500),
            retry: RetryPolicy::default(),
            backends: BackendPreference::default(),
        }
    }
}
