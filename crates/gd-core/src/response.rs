//! Per-sensor calibration outcome records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::component::{BumpStatus, InstalledSensor};
use crate::endpoint::UsedGasEndPoint;
use crate::error::{CoreError, CoreResult};
use crate::gas::GasCode;
use crate::slot::Slot;

/// A sensor reading with the wall-clock instant it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub at: DateTime<Utc>,
}

impl Reading {
    pub fn now(value: f64) -> Self {
        Self {
            value,
            at: Utc::now(),
        }
    }
}

/// Outcome of calibrating one sensor.
///
/// `SpanFailed` is the only non-pending, non-terminal status: it sends the
/// state machine back for another gas source. Everything else ends the
/// sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseStatus {
    /// No verdict yet; also the final state when a pre-check reset probe
    /// aborts the sensor before any attempt.
    Pending,
    /// Clean-air baseline verification failed; no gas was applied.
    ZeroFailed,
    /// Zeroing verified but calibration was skipped (disabled or filtered
    /// out). Counts as passing for the session aggregate.
    ZeroPassed,
    /// Hard failure: timeout, exhausted span reserve, or sensor-age expiry.
    Failed,
    /// Hardware rejected the span; another gas source may still succeed.
    SpanFailed,
    Passed,
    /// The instrument reset or silently abandoned the calibration.
    InstrumentAborted,
}

impl ResponseStatus {
    /// Terminal statuses end the sensor; `Pending` and `SpanFailed` do not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResponseStatus::Pending | ResponseStatus::SpanFailed)
    }

    /// Statuses that do not fail the session aggregate.
    pub fn is_passing(&self) -> bool {
        matches!(self, ResponseStatus::Passed | ResponseStatus::ZeroPassed)
    }

    /// Whether a transition to `to` is allowed.
    ///
    /// From `Pending` anything is allowed; from `SpanFailed` any retry
    /// outcome; from `Passed` only the documented downgrades (span reserve
    /// exhausted, last-calibration time did not advance). All other
    /// terminal statuses are frozen.
    pub fn allows(&self, to: ResponseStatus) -> bool {
        match self {
            ResponseStatus::Pending => true,
            ResponseStatus::SpanFailed => to != ResponseStatus::Pending,
            ResponseStatus::Passed => {
                matches!(to, ResponseStatus::Failed | ResponseStatus::InstrumentAborted)
            }
            _ => false,
        }
    }
}

/// The mutable per-sensor outcome record for a whole session.
///
/// Created once per sensor before the state machine runs; the state
/// machine mutates it in place and its final `status` is the visible
/// contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorGasResponse {
    pub slot: Slot,
    pub sensor_uid: Uuid,
    pub gas: GasCode,
    pub status: ResponseStatus,
    /// Last calibration reading taken during polling.
    pub reading: Option<Reading>,
    /// Clean-air baseline captured just before gas exposure.
    pub baseline: Option<f64>,
    pub zero_offset: Option<f64>,
    /// Remaining sensitivity margin reported after an apparent pass (%).
    pub span_reserve: Option<f64>,
    /// Whether an accessory pump was fitted during the attempt.
    pub accessory_pump: bool,
    /// Wall-clock time spent on this sensor (all attempts), seconds.
    pub duration_s: f64,
    /// Session time accumulated up to and including this sensor, seconds.
    pub cumulative_s: f64,
    /// Reading taken just before preconditioning.
    pub pre_precondition: Option<Reading>,
    /// Reading taken right after preconditioning.
    pub post_precondition: Option<Reading>,
    /// Reading taken after the post-session purge.
    pub post_purge: Option<Reading>,
    /// Bump-test status refreshed from hardware at finalization.
    pub bump_status: BumpStatus,
    /// Gas end points consumed by this sensor, in consumption order.
    pub used_gas_end_points: Vec<UsedGasEndPoint>,
}

impl SensorGasResponse {
    /// Create the pending response for a sensor, before any attempt runs.
    pub fn new(sensor: &InstalledSensor) -> Self {
        Self {
            slot: sensor.slot,
            sensor_uid: sensor.uid,
            gas: sensor.gas,
            status: ResponseStatus::Pending,
            reading: None,
            baseline: None,
            zero_offset: None,
            span_reserve: None,
            accessory_pump: false,
            duration_s: 0.0,
            cumulative_s: 0.0,
            pre_precondition: None,
            post_precondition: None,
            post_purge: None,
            bump_status: sensor.bump_status,
            used_gas_end_points: Vec::new(),
        }
    }

    /// Move the response to a new status.
    ///
    /// Rejects any transition not allowed by [`ResponseStatus::allows`],
    /// so a terminal verdict can never be silently overwritten.
    pub fn transition(&mut self, to: ResponseStatus) -> CoreResult<()> {
        if !self.status.allows(to) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::Slot;
    use proptest::prelude::*;

    fn response() -> SensorGasResponse {
        let sensor = InstalledSensor::new(Slot::from_index(0), GasCode::CO, 100.0, 1.0);
        SensorGasResponse::new(&sensor)
    }

    #[test]
    fn span_failed_retries_to_pass() {
        let mut r = response();
        r.transition(ResponseStatus::SpanFailed).unwrap();
        r.transition(ResponseStatus::SpanFailed).unwrap();
        r.transition(ResponseStatus::Passed).unwrap();
        assert_eq!(r.status, ResponseStatus::Passed);
    }

    #[test]
    fn passed_downgrades_only() {
        let mut r = response();
        r.transition(ResponseStatus::Passed).unwrap();
        assert!(r.transition(ResponseStatus::ZeroPassed).is_err());
        r.transition(ResponseStatus::InstrumentAborted).unwrap();
        assert_eq!(r.status, ResponseStatus::InstrumentAborted);
    }

    #[test]
    fn zero_failed_is_frozen() {
        let mut r = response();
        r.transition(ResponseStatus::ZeroFailed).unwrap();
        assert!(r.transition(ResponseStatus::Passed).is_err());
        assert_eq!(r.status, ResponseStatus::ZeroFailed);
    }

    #[test]
    fn passing_statuses() {
        assert!(ResponseStatus::Passed.is_passing());
        assert!(ResponseStatus::ZeroPassed.is_passing());
        assert!(!ResponseStatus::Pending.is_passing());
        assert!(!ResponseStatus::SpanFailed.is_passing());
        assert!(!ResponseStatus::InstrumentAborted.is_passing());
    }

    fn any_status() -> impl Strategy<Value = ResponseStatus> {
        prop_oneof![
            Just(ResponseStatus::Pending),
            Just(ResponseStatus::ZeroFailed),
            Just(ResponseStatus::ZeroPassed),
            Just(ResponseStatus::Failed),
            Just(ResponseStatus::SpanFailed),
            Just(ResponseStatus::Passed),
            Just(ResponseStatus::InstrumentAborted),
        ]
    }

    proptest! {
        /// Whatever sequence of transitions is attempted, a terminal
        /// status other than Passed is never left and Passed only ever
        /// becomes Failed or InstrumentAborted.
        #[test]
        fn terminal_statuses_never_silently_overwritten(seq in prop::collection::vec(any_status(), 1..20)) {
            let mut r = response();
            for to in seq {
                let before = r.status;
                let ok = r.transition(to).is_ok();
                if before.is_terminal() && before != ResponseStatus::Passed {
                    prop_assert!(!ok);
                    prop_assert_eq!(r.status, before);
                }
                if before == ResponseStatus::Passed && ok {
                    prop_assert!(matches!(
                        r.status,
                        ResponseStatus::Failed | ResponseStatus::InstrumentAborted
                    ));
                }
            }
        }
    }
}
