//! Init process configuration.

use std::time::Duration;

/// Timing configuration for the shutdown sequence.
///
/// The defaults are the production values; tests shrink them to keep
/// the escalation scenarios fast.
#[derive(Debug, Clone)]
pub struct InitConfig {
    /// Number of SIGTERM phases before escalating to SIGKILL.
    pub term_phases: u32,
    /// How long each shutdown phase waits for services to exit.
    pub phase_budget: Duration,
    /// How often the repository is polled for emptiness during a phase.
    pub poll_interval: Duration,
    /// How long teardown waits for the signal pump to acknowledge exit.
    pub pump_grace: Duration,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            term_phases: 3,
            phase_budget: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            pump_grace: Duration::from_millis(100),
        }
    }
}
