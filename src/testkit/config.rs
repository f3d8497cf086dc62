//! Canonical test configurations.

use std::time::Duration;

use crate::trading::ExecutorSettings;

/// No priming, no base restriction and millisecond restarts.
pub fn fast_settings() -> ExecutorSettings {
    ExecutorSettings {
        base_currency: None,
        prime_samples: Some(0),
        restart_base: Duration::from_millis(1),
        restart_max: Duration::from_millis(10),
    }
}
