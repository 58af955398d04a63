//! Broker configuration.

use std::time::Duration;

use carekey_core::DEFAULT_AUDIT_CAP;

/// Configuration for the broker.
#[derive(Debug, Clone)]
pub struct CareKeyConfig {
    /// Cap of each actor's audit ledger.
    pub audit_cap: usize,
    /// Per-step timeout for cross-actor handshake calls.
    pub call_timeout: Duration,
    /// How often the background sweeper revokes expired grants.
    pub sweep_interval: Duration,
    /// Iteration cap for guarded execution loops.
    pub max_loop_iterations: u32,
}

impl Default for CareKeyConfig {
    fn default() -> Self {
        Self {
            audit_cap: DEFAULT_AUDIT_CAP,
            call_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(60),
            max_loop_iterations: 16,
        }
    }
}
