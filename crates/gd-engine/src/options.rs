//! Session tunables.

use std::time::Duration;

use gd_core::GasCode;

/// Service-account policy applied on top of the hardware verdict.
#[derive(Clone, Debug, Default)]
pub struct AccountPolicy {
    /// Sensors older than this are failed before any gas is spent.
    pub max_sensor_age_days: Option<i64>,
    /// An apparent pass below this span reserve is downgraded to failed.
    pub min_span_reserve_pct: Option<f64>,
}

/// Options for a calibration session.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Sleep between poll-loop iterations.
    pub poll_interval: Duration,
    /// Safety cushion added to the hardware-reported calibration timeout.
    pub timeout_cushion: Duration,
    /// When set, only sensors for these gases are calibrated; the rest are
    /// skipped as `ZeroPassed`.
    pub sensor_filter: Option<Vec<GasCode>>,
    /// This session is an O2 high-bump escalation: skip the
    /// cylinder-switch purge when changing sources.
    pub o2_high_bump: bool,
    /// Account-level overrides.
    pub account: AccountPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout_cushion: Duration::from_secs(10),
            sensor_filter: None,
            o2_high_bump: false,
            account: AccountPolicy::default(),
        }
    }
}
