//! Per-sensor calibration state machine.
//!
//! Calibrates one sensor against as many gas-source attempts as it takes:
//! pre-checks short-circuit without touching gas, the main loop retries
//! span failures on fresh sources until exhaustion, and the poll loop
//! watches a wall-clock deadline against the instrument's own progress
//! flag. Every suspension point doubles as an undock/reset check.
//!
//! The valve discipline is acquire/use/release: an attempt that opens a
//! valve closes it on every exit path, and nothing is closed when nothing
//! was opened.

use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use gd_core::{InstalledSensor, Reading, ResponseStatus, SensorGasResponse, UsagePurpose};
use gd_hal::{CalibratingState, DockPorts, PurgeCoordinator, PurgeKind};
use tracing::{debug, warn};

use crate::error::{CalError, CalResult};
use crate::selector;
use crate::sequencer::CalibrationSession;

/// How one gas-source attempt ended, as seen by the retry loop.
enum AttemptOutcome {
    /// Terminal for the sensor: Passed, Failed or InstrumentAborted was
    /// written to the response.
    Terminal,
    /// Hardware rejected the span; try another source.
    SpanFailed,
}

impl<D: DockPorts + ?Sized, P: PurgeCoordinator + ?Sized> CalibrationSession<'_, D, P> {
    /// Calibrate one sensor, mutating its pre-created response in place.
    ///
    /// Sensor-scoped outcomes land in the response status; only
    /// session-fatal faults are returned. Finalization (duration
    /// bookkeeping, concentration restore, bump refresh) runs exactly
    /// once, on faulted paths too.
    pub(crate) fn calibrate_sensor(&mut self, sensor: &mut InstalledSensor) -> CalResult<()> {
        let ridx = self.responses.len();
        self.responses.push(SensorGasResponse::new(sensor));

        let started = Instant::now();
        let result = self.calibrate_sensor_inner(sensor, ridx);
        self.finalize_sensor(sensor, ridx, started);
        result
    }

    fn calibrate_sensor_inner(
        &mut self,
        sensor: &mut InstalledSensor,
        ridx: usize,
    ) -> CalResult<()> {
        let slot = sensor.slot;

        // Pre-checks, each short-circuiting with a terminal outcome.
        if !self.ports.is_sensor_zeroed(slot)? {
            debug!(slot = %slot, "zeroing not verified");
            self.responses[ridx].transition(ResponseStatus::ZeroFailed)?;
            return Ok(());
        }
        if !self.ports.is_calibration_enabled(sensor)? {
            debug!(slot = %slot, "calibration disabled for sensor");
            self.responses[ridx].transition(ResponseStatus::ZeroPassed)?;
            return Ok(());
        }
        if let Some(filter) = &self.opts.sensor_filter {
            if !filter.contains(&sensor.gas) {
                debug!(slot = %slot, gas = %sensor.gas, "sensor filtered out");
                self.responses[ridx].transition(ResponseStatus::ZeroPassed)?;
                return Ok(());
            }
        }
        if let Some(max_age) = self.opts.account.max_sensor_age_days {
            if sensor.age_days(Utc::now()).is_some_and(|age| age > max_age) {
                warn!(slot = %slot, "sensor past service age limit");
                self.responses[ridx].transition(ResponseStatus::Failed)?;
                return Ok(());
            }
        }
        if self.ports.detect_reset("calibration pre-check")? {
            // Abort this sensor without a verdict; Pending is non-passing.
            warn!(slot = %slot, "instrument reset before calibration");
            return Ok(());
        }

        // Main loop: one iteration per gas-source attempt.
        let mut tried: Vec<usize> = Vec::new();
        let mut span_failed = false;
        loop {
            let Some(eidx) = selector::next_untried(&self.end_points, sensor.gas, &tried) else {
                if span_failed {
                    // The last SpanFailed response stands as the outcome.
                    return Ok(());
                }
                return Err(CalError::GasUnavailable { gas: sensor.gas });
            };
            tried.push(eidx);

            if self.last_source.is_some_and(|prev| prev != eidx) && !self.opts.o2_high_bump {
                debug!(slot = %slot, "switching gas source, purging lines");
                self.purge.purge(
                    PurgeKind::CylinderSwitch,
                    &mut self.end_points,
                    &mut self.responses,
                    Some(slot),
                )?;
            }
            self.last_source = Some(eidx);

            let available = self
                .ports
                .set_calibration_gas_concentration(sensor, &self.end_points[eidx])?;
            if available == 0.0 {
                // Wrong gas behind this end point; try the next one.
                debug!(slot = %slot, source = %self.end_points[eidx].slot, "source cannot supply gas");
                continue;
            }

            match self.run_attempt(sensor, ridx, eidx)? {
                AttemptOutcome::Terminal => return Ok(()),
                AttemptOutcome::SpanFailed => span_failed = true,
            }
        }
    }

    /// One gas-source attempt: precondition, settle, expose, poll, judge.
    fn run_attempt(
        &mut self,
        sensor: &mut InstalledSensor,
        ridx: usize,
        eidx: usize,
    ) -> CalResult<AttemptOutcome> {
        let slot = sensor.slot;

        let timeout =
            self.ports.sensor_calibration_timeout(slot)? + self.opts.timeout_cushion;

        let pre = self.ports.calibration_reading(slot, sensor.resolution)?;
        self.responses[ridx].pre_precondition = Some(Reading::now(pre));

        let precondition = self
            .ports
            .precondition_sensor(sensor, &self.end_points[eidx])?;
        if !precondition.is_zero() {
            self.record_usage(ridx, eidx, UsagePurpose::Precondition, precondition.as_secs_f64());
        }
        if !self.ports.is_docked() {
            return Err(CalError::NotDocked);
        }

        let post = self.ports.calibration_reading(slot, sensor.resolution)?;
        self.responses[ridx].post_precondition = Some(Reading::now(post));
        if self.ports.detect_reset("post-precondition")? {
            self.responses[ridx].transition(ResponseStatus::InstrumentAborted)?;
            return Ok(AttemptOutcome::Terminal);
        }

        // Settling step: stop external flow before the real exposure.
        self.ports.pause_gas_flow(&self.end_points[eidx], sensor)?;
        if self.ports.detect_reset("gas-flow pause")? {
            self.responses[ridx].transition(ResponseStatus::InstrumentAborted)?;
            return Ok(AttemptOutcome::Terminal);
        }

        self.responses[ridx].baseline = Some(self.ports.sensor_baseline(slot)?);
        self.responses[ridx].zero_offset = Some(self.ports.sensor_zero_offset(slot)?);
        self.responses[ridx].accessory_pump = self.ports.has_accessory_pump();
        let last_cal_before = self.ports.last_calibration_time(slot)?;

        self.ports
            .open_gas_end_point(&self.end_points[eidx], sensor.flow_rate_lpm)?;

        let outcome = self.expose_and_poll(sensor, ridx, eidx, timeout, last_cal_before);

        // Guaranteed release: the valve this attempt opened is closed on
        // every path. A close fault must not mask the attempt's outcome.
        if let Err(err) = self.ports.close_gas_end_point(&self.end_points[eidx]) {
            warn!(source = %self.end_points[eidx].slot, error = %err, "failed to close gas end point");
        }

        outcome
    }

    /// The poll loop and verdict (steps between valve open and close).
    fn expose_and_poll(
        &mut self,
        sensor: &mut InstalledSensor,
        ridx: usize,
        eidx: usize,
        timeout: Duration,
        last_cal_before: chrono::DateTime<Utc>,
    ) -> CalResult<AttemptOutcome> {
        let slot = sensor.slot;

        self.ports.begin_sensor_calibration(&[slot])?;

        let start = Instant::now();
        let deadline = start + timeout;
        let mut reset = false;
        let mut hw_aborted = false;
        let mut timed_out = false;

        loop {
            thread::sleep(self.opts.poll_interval);

            // Deadline first: an expired timeout must cause no further
            // hardware reads.
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }
            if !self.ports.is_docked() {
                break;
            }
            if self.ports.is_bad_pump_tubing()? {
                self.record_usage(ridx, eidx, UsagePurpose::Calibration, start.elapsed().as_secs_f64());
                return Err(CalError::FlowFailure {
                    slot: self.end_points[eidx].slot,
                    what: "bad pump tubing",
                });
            }

            let value = self.ports.calibration_reading(slot, sensor.resolution)?;
            self.responses[ridx].reading = Some(Reading::now(value));

            if self.ports.detect_reset("calibration poll")? {
                reset = true;
            }
            let calibrating = match self.ports.is_calibrating(slot)? {
                CalibratingState::Calibrating => true,
                CalibratingState::Done => false,
                CalibratingState::Unavailable => {
                    hw_aborted = true;
                    false
                }
            };
            let valve_open = self.ports.open_valve_position().is_some();

            if !calibrating || !valve_open || reset {
                break;
            }
        }

        // The gas was spent whatever happened; the audit entry is owed on
        // every path.
        self.record_usage(ridx, eidx, UsagePurpose::Calibration, start.elapsed().as_secs_f64());

        if !self.ports.is_docked() {
            return Err(CalError::NotDocked);
        }
        if self.ports.open_valve_position().is_none() {
            // Exhausted or disconnected cylinder: flow stopped under us.
            return Err(CalError::FlowFailure {
                slot: self.end_points[eidx].slot,
                what: "gas source stopped flowing",
            });
        }

        if timed_out {
            debug!(slot = %slot, "calibration timed out");
            self.responses[ridx].transition(ResponseStatus::Failed)?;
            return Ok(AttemptOutcome::Terminal);
        }
        if reset || hw_aborted {
            self.responses[ridx].transition(ResponseStatus::InstrumentAborted)?;
            return Ok(AttemptOutcome::Terminal);
        }

        if !self.ports.calibration_passed(slot)? {
            self.responses[ridx].transition(ResponseStatus::SpanFailed)?;
            return Ok(AttemptOutcome::SpanFailed);
        }

        // Apparent pass; apply the documented downgrades in order.
        let reserve = self.ports.span_reserve(slot)?;
        self.responses[ridx].span_reserve = Some(reserve);
        self.responses[ridx].transition(ResponseStatus::Passed)?;

        if reserve <= 0.0 {
            warn!(slot = %slot, "span reserve exhausted despite pass");
            self.responses[ridx].transition(ResponseStatus::Failed)?;
            return Ok(AttemptOutcome::Terminal);
        }

        let last_cal_after = self.ports.last_calibration_time(slot)?;
        if last_cal_after == last_cal_before {
            // The instrument never committed the calibration.
            warn!(slot = %slot, "last-calibration time did not advance");
            self.responses[ridx].transition(ResponseStatus::InstrumentAborted)?;
            return Ok(AttemptOutcome::Terminal);
        }

        if let Some(min) = self.opts.account.min_span_reserve_pct {
            if reserve < min {
                warn!(slot = %slot, reserve, min, "span reserve below account threshold");
                self.responses[ridx].transition(ResponseStatus::Failed)?;
                return Ok(AttemptOutcome::Terminal);
            }
        }

        // Write-back happens while demonstrably docked (the poll loop just
        // confirmed it).
        sensor.last_cal_at = Some(last_cal_after);
        Ok(AttemptOutcome::Terminal)
    }

    /// Always-once per-sensor finalization: duration bookkeeping, then
    /// hardware restore steps whose faults are logged, never propagated:
    /// a cleanup fault must not invalidate a calibration verdict.
    fn finalize_sensor(&mut self, sensor: &mut InstalledSensor, ridx: usize, started: Instant) {
        let duration_s = started.elapsed().as_secs_f64();
        self.cumulative_s += duration_s;
        self.responses[ridx].duration_s = duration_s;
        self.responses[ridx].cumulative_s = self.cumulative_s;

        if !self.ports.is_docked() {
            return;
        }
        if let Err(err) =
            self.ports
                .restore_calibration_gas_concentration(sensor, sensor.cal_concentration)
        {
            warn!(slot = %sensor.slot, error = %err, "failed to restore calibration gas concentration");
        }
        match self.ports.bump_status(sensor.slot) {
            Ok(status) => {
                sensor.bump_status = status;
                self.responses[ridx].bump_status = status;
            }
            Err(err) => warn!(slot = %sensor.slot, error = %err, "failed to refresh bump status"),
        }
    }

    /// Record a usage entry on the end point and mirror it into the
    /// sensor's response.
    fn record_usage(&mut self, ridx: usize, eidx: usize, purpose: UsagePurpose, duration_s: f64) {
        let record = self.end_points[eidx].record_usage(purpose, duration_s);
        self.responses[ridx].used_gas_end_points.push(record);
    }
}
