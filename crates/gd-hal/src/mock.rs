//! Scriptable in-memory dock for tests and the CLI simulator.
//!
//! `MockDock` implements the instrument and gas-flow ports over a behavior
//! table: tests script zeroing results, per-source verdicts, poll counts,
//! undocking, resets and pump faults, then interrogate the append-only
//! event log for ordering and exclusivity invariants.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use gd_core::{BumpStatus, GasEndPoint, InstalledSensor, SensorGasResponse, Slot, UsagePurpose};
use tracing::trace;

use crate::error::{HalError, HalResult};
use crate::ports::{CalibratingState, GasFlowPort, InstrumentPort, PurgeCoordinator, PurgeKind};

/// One observable hardware action, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    EnteredCalMode,
    ExitedCalMode,
    ConcentrationSet { sensor: Slot, source: Slot },
    ConcentrationRestored { sensor: Slot },
    Preconditioned { sensor: Slot, source: Slot },
    GasFlowPaused { source: Slot },
    ValveOpened(Slot),
    ValveClosed(Slot),
    BeganCalibration(Slot),
    Reading(Slot),
}

/// Scriptable dock standing in for the instrument, pump and valve drivers.
///
/// Poll-indexed triggers count the engine's poll iterations per attempt:
/// poll 0 is "before the poll loop starts" (pre-checks, precondition,
/// settling), poll 1 is the first loop iteration.
pub struct MockDock {
    // behavior table
    zeroed: HashMap<u32, bool>,
    cal_enabled: HashMap<u32, bool>,
    wrong_gas_sources: HashSet<u32>,
    verdict_by_source: HashMap<u32, bool>,
    span_reserve: HashMap<u32, f64>,
    readings: HashMap<u32, f64>,
    bump: HashMap<u32, BumpStatus>,
    polls_to_finish: usize,
    hardware_timeout: Duration,
    precondition_time: Duration,
    undock_after_polls: Option<usize>,
    reset_at_poll: Option<usize>,
    unavailable_at_poll: Option<usize>,
    bad_tubing_at_poll: Option<usize>,
    valve_drops_at_poll: Option<usize>,
    advance_last_cal: bool,
    accessory_pump: bool,

    // live state
    docked: bool,
    in_cal_mode: bool,
    open_valve: Option<Slot>,
    current_source: Option<Slot>,
    polls: usize,
    last_cal: HashMap<u32, DateTime<Utc>>,
    epoch: DateTime<Utc>,

    /// Append-only call log for test assertions.
    pub events: Vec<MockEvent>,
    /// Total calibration readings taken, across all attempts.
    pub reading_calls: usize,
    /// Calibration-mode bracket counters.
    pub cal_mode_entries: usize,
    pub cal_mode_exits: usize,
}

impl Default for MockDock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDock {
    /// A docked instrument where every sensor zeroes, finishes after one
    /// poll and passes with 50% span reserve.
    pub fn new() -> Self {
        Self {
            zeroed: HashMap::new(),
            cal_enabled: HashMap::new(),
            wrong_gas_sources: HashSet::new(),
            verdict_by_source: HashMap::new(),
            span_reserve: HashMap::new(),
            readings: HashMap::new(),
            bump: HashMap::new(),
            polls_to_finish: 1,
            hardware_timeout: Duration::from_secs(120),
            precondition_time: Duration::ZERO,
            undock_after_polls: None,
            reset_at_poll: None,
            unavailable_at_poll: None,
            bad_tubing_at_poll: None,
            valve_drops_at_poll: None,
            advance_last_cal: true,
            accessory_pump: false,
            docked: true,
            in_cal_mode: false,
            open_valve: None,
            current_source: None,
            polls: 0,
            last_cal: HashMap::new(),
            epoch: Utc::now() - chrono::Duration::days(1),
            events: Vec::new(),
            reading_calls: 0,
            cal_mode_entries: 0,
            cal_mode_exits: 0,
        }
    }

    /// Script a sensor's zeroing check.
    pub fn with_zeroed(mut self, slot: Slot, zeroed: bool) -> Self {
        self.zeroed.insert(slot.index(), zeroed);
        self
    }

    /// Script a sensor's calibration-enabled flag.
    pub fn with_cal_enabled(mut self, slot: Slot, enabled: bool) -> Self {
        self.cal_enabled.insert(slot.index(), enabled);
        self
    }

    /// Mark a source as carrying the wrong gas: programming a
    /// concentration from it returns 0.0.
    pub fn with_wrong_gas(mut self, source: Slot) -> Self {
        self.wrong_gas_sources.insert(source.index());
        self
    }

    /// Script the pass/fail verdict for attempts fed by a source.
    pub fn with_verdict_for_source(mut self, source: Slot, passed: bool) -> Self {
        self.verdict_by_source.insert(source.index(), passed);
        self
    }

    /// Script a sensor's span reserve (default 50%).
    pub fn with_span_reserve(mut self, slot: Slot, reserve: f64) -> Self {
        self.span_reserve.insert(slot.index(), reserve);
        self
    }

    /// Script the value returned by calibration readings.
    pub fn with_reading(mut self, slot: Slot, value: f64) -> Self {
        self.readings.insert(slot.index(), value);
        self
    }

    /// Script a sensor's bump status (default `Passed`).
    pub fn with_bump_status(mut self, slot: Slot, status: BumpStatus) -> Self {
        self.bump.insert(slot.index(), status);
        self
    }

    /// Number of poll iterations before the hardware reports done
    /// (default 1; `usize::MAX` never finishes).
    pub fn with_polls_to_finish(mut self, polls: usize) -> Self {
        self.polls_to_finish = polls;
        self
    }

    /// Hardware-reported calibration timeout.
    pub fn with_hardware_timeout(mut self, timeout: Duration) -> Self {
        self.hardware_timeout = timeout;
        self
    }

    /// Gas time consumed by preconditioning.
    pub fn with_precondition_time(mut self, time: Duration) -> Self {
        self.precondition_time = time;
        self
    }

    /// Undock the instrument once the given poll count is reached.
    pub fn with_undock_after_polls(mut self, polls: usize) -> Self {
        self.undock_after_polls = Some(polls);
        self
    }

    /// Report an instrument reset at the given poll (one-shot).
    pub fn with_reset_at_poll(mut self, poll: usize) -> Self {
        self.reset_at_poll = Some(poll);
        self
    }

    /// Report the tri-state calibration query as `Unavailable` at the
    /// given poll.
    pub fn with_unavailable_at_poll(mut self, poll: usize) -> Self {
        self.unavailable_at_poll = Some(poll);
        self
    }

    /// Report bad pump tubing once the given poll count is reached.
    pub fn with_bad_tubing_at_poll(mut self, poll: usize) -> Self {
        self.bad_tubing_at_poll = Some(poll);
        self
    }

    /// Make the open valve read back as closed once the given poll count
    /// is reached (an exhausted or disconnected cylinder).
    pub fn with_valve_drop_at_poll(mut self, poll: usize) -> Self {
        self.valve_drops_at_poll = Some(poll);
        self
    }

    /// Freeze the last-calibration clock even when the hardware passes.
    pub fn with_frozen_last_cal(mut self) -> Self {
        self.advance_last_cal = false;
        self
    }

    /// Fit an accessory pump.
    pub fn with_accessory_pump(mut self) -> Self {
        self.accessory_pump = true;
        self
    }

    fn poll_trigger(&self, at: Option<usize>) -> bool {
        at.is_some_and(|n| self.polls >= n)
    }
}

impl InstrumentPort for MockDock {
    fn is_docked(&self) -> bool {
        self.docked && !self.poll_trigger(self.undock_after_polls)
    }

    fn enter_calibration_mode(&mut self) -> HalResult<()> {
        self.in_cal_mode = true;
        self.cal_mode_entries += 1;
        self.events.push(MockEvent::EnteredCalMode);
        Ok(())
    }

    fn exit_calibration_mode(&mut self) -> HalResult<()> {
        self.in_cal_mode = false;
        self.cal_mode_exits += 1;
        self.events.push(MockEvent::ExitedCalMode);
        Ok(())
    }

    fn is_sensor_zeroed(&mut self, slot: Slot) -> HalResult<bool> {
        Ok(*self.zeroed.get(&slot.index()).unwrap_or(&true))
    }

    fn is_calibration_enabled(&mut self, sensor: &InstalledSensor) -> HalResult<bool> {
        Ok(*self.cal_enabled.get(&sensor.slot.index()).unwrap_or(&true))
    }

    fn set_calibration_gas_concentration(
        &mut self,
        sensor: &InstalledSensor,
        source: &GasEndPoint,
    ) -> HalResult<f64> {
        self.events.push(MockEvent::ConcentrationSet {
            sensor: sensor.slot,
            source: source.slot,
        });
        if self.wrong_gas_sources.contains(&source.slot.index()) {
            return Ok(0.0);
        }
        self.current_source = Some(source.slot);
        Ok(source.concentration())
    }

    fn restore_calibration_gas_concentration(
        &mut self,
        sensor: &InstalledSensor,
        _concentration: f64,
    ) -> HalResult<()> {
        self.events.push(MockEvent::ConcentrationRestored {
            sensor: sensor.slot,
        });
        Ok(())
    }

    fn sensor_calibration_timeout(&mut self, _slot: Slot) -> HalResult<Duration> {
        Ok(self.hardware_timeout)
    }

    fn precondition_sensor(
        &mut self,
        sensor: &InstalledSensor,
        source: &GasEndPoint,
    ) -> HalResult<Duration> {
        self.events.push(MockEvent::Preconditioned {
            sensor: sensor.slot,
            source: source.slot,
        });
        Ok(self.precondition_time)
    }

    fn pause_gas_flow(&mut self, source: &GasEndPoint, _sensor: &InstalledSensor) -> HalResult<()> {
        self.events.push(MockEvent::GasFlowPaused {
            source: source.slot,
        });
        Ok(())
    }

    fn sensor_baseline(&mut self, slot: Slot) -> HalResult<f64> {
        Ok(*self.readings.get(&slot.index()).unwrap_or(&0.0) * 0.01)
    }

    fn sensor_zero_offset(&mut self, _slot: Slot) -> HalResult<f64> {
        Ok(0.0)
    }

    fn begin_sensor_calibration(&mut self, slots: &[Slot]) -> HalResult<()> {
        // New attempt: poll-indexed triggers start over.
        self.polls = 0;
        for slot in slots {
            self.events.push(MockEvent::BeganCalibration(*slot));
        }
        Ok(())
    }

    fn calibration_reading(&mut self, slot: Slot, resolution: f64) -> HalResult<f64> {
        self.reading_calls += 1;
        self.events.push(MockEvent::Reading(slot));
        let raw = *self.readings.get(&slot.index()).unwrap_or(&0.0);
        Ok((raw / resolution).round() * resolution)
    }

    fn is_calibrating(&mut self, _slot: Slot) -> HalResult<CalibratingState> {
        if self.poll_trigger(self.unavailable_at_poll) {
            return Ok(CalibratingState::Unavailable);
        }
        if self.polls >= self.polls_to_finish {
            Ok(CalibratingState::Done)
        } else {
            Ok(CalibratingState::Calibrating)
        }
    }

    fn calibration_passed(&mut self, slot: Slot) -> HalResult<bool> {
        let passed = self
            .current_source
            .map(|s| *self.verdict_by_source.get(&s.index()).unwrap_or(&true))
            .unwrap_or(false);
        if passed && self.advance_last_cal {
            // A committed calibration advances the instrument's clock.
            self.last_cal.insert(slot.index(), Utc::now());
        }
        Ok(passed)
    }

    fn span_reserve(&mut self, slot: Slot) -> HalResult<f64> {
        Ok(*self.span_reserve.get(&slot.index()).unwrap_or(&50.0))
    }

    fn last_calibration_time(&mut self, slot: Slot) -> HalResult<DateTime<Utc>> {
        Ok(*self.last_cal.get(&slot.index()).unwrap_or(&self.epoch))
    }

    fn detect_reset(&mut self, _context: &str) -> HalResult<bool> {
        if self.poll_trigger(self.reset_at_poll) {
            // One-shot: a reset is reported once and then clears.
            self.reset_at_poll = None;
            return Ok(true);
        }
        Ok(false)
    }

    fn bump_status(&mut self, slot: Slot) -> HalResult<BumpStatus> {
        Ok(*self.bump.get(&slot.index()).unwrap_or(&BumpStatus::Passed))
    }
}

impl GasFlowPort for MockDock {
    fn open_gas_end_point(&mut self, source: &GasEndPoint, _flow_rate_lpm: f64) -> HalResult<()> {
        if let Some(open) = self.open_valve {
            return Err(HalError::ValveBusy(open));
        }
        trace!(valve = %source.slot, "valve opened");
        self.open_valve = Some(source.slot);
        self.events.push(MockEvent::ValveOpened(source.slot));
        Ok(())
    }

    fn close_gas_end_point(&mut self, source: &GasEndPoint) -> HalResult<()> {
        trace!(valve = %source.slot, "valve closed");
        if self.open_valve == Some(source.slot) {
            self.open_valve = None;
        }
        self.events.push(MockEvent::ValveClosed(source.slot));
        Ok(())
    }

    fn open_valve_position(&self) -> Option<Slot> {
        if self.poll_trigger(self.valve_drops_at_poll) {
            return None;
        }
        self.open_valve
    }

    fn is_bad_pump_tubing(&mut self) -> HalResult<bool> {
        // Called exactly once per poll iteration; doubles as the poll
        // counter for the other poll-indexed triggers.
        self.polls += 1;
        Ok(self.poll_trigger(self.bad_tubing_at_poll))
    }

    fn has_accessory_pump(&self) -> bool {
        self.accessory_pump
    }
}

/// Recording purge coordinator.
#[derive(Default)]
pub struct MockPurge {
    /// Purge invocations in call order.
    pub calls: Vec<(PurgeKind, Option<Slot>)>,
    /// Fail every purge with a pump fault.
    pub fail: bool,
}

impl MockPurge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: Vec::new(),
            fail: true,
        }
    }
}

impl PurgeCoordinator for MockPurge {
    fn purge(
        &mut self,
        kind: PurgeKind,
        end_points: &mut [GasEndPoint],
        _responses: &mut [SensorGasResponse],
        affected: Option<Slot>,
    ) -> HalResult<()> {
        self.calls.push((kind, affected));
        if self.fail {
            return Err(HalError::Pump {
                what: "purge exhaust blocked",
            });
        }
        // A real purge draws fresh air; keep the audit trail honest.
        if let Some(fresh) = end_points
            .iter_mut()
            .find(|e| e.gas_code() == gd_core::GasCode::FreshAir)
        {
            fresh.record_usage(UsagePurpose::SwitchPurge, 30.0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gd_core::{Cylinder, GasCode, GasSourceKind};

    fn co_sensor() -> InstalledSensor {
        InstalledSensor::new(Slot::from_index(0), GasCode::CO, 100.0, 1.0)
    }

    fn co_source(slot: u32) -> GasEndPoint {
        GasEndPoint::new(
            Slot::from_index(slot),
            GasSourceKind::CylinderCard(Cylinder::new(GasCode::CO, 100.0)),
        )
    }

    #[test]
    fn valve_exclusivity_enforced() {
        let mut dock = MockDock::new();
        let a = co_source(1);
        let b = co_source(2);

        dock.open_gas_end_point(&a, 0.5).unwrap();
        assert!(matches!(
            dock.open_gas_end_point(&b, 0.5),
            Err(HalError::ValveBusy(_))
        ));

        dock.close_gas_end_point(&a).unwrap();
        dock.open_gas_end_point(&b, 0.5).unwrap();
        assert_eq!(dock.open_valve_position(), Some(b.slot));
    }

    #[test]
    fn wrong_gas_reports_zero_concentration() {
        let source = co_source(3);
        let mut dock = MockDock::new().with_wrong_gas(source.slot);
        let sensor = co_sensor();

        let available = dock
            .set_calibration_gas_concentration(&sensor, &source)
            .unwrap();
        assert_eq!(available, 0.0);
    }

    #[test]
    fn poll_counter_drives_finish() {
        let mut dock = MockDock::new().with_polls_to_finish(2);
        let slot = Slot::from_index(0);
        dock.begin_sensor_calibration(&[slot]).unwrap();

        dock.is_bad_pump_tubing().unwrap();
        assert_eq!(dock.is_calibrating(slot).unwrap(), CalibratingState::Calibrating);
        dock.is_bad_pump_tubing().unwrap();
        assert_eq!(dock.is_calibrating(slot).unwrap(), CalibratingState::Done);
    }

    #[test]
    fn reset_is_one_shot() {
        let mut dock = MockDock::new().with_reset_at_poll(0);
        assert!(dock.detect_reset("pre-check").unwrap());
        assert!(!dock.detect_reset("pre-check").unwrap());
    }

    #[test]
    fn purge_records_fresh_air_usage() {
        let mut purge = MockPurge::new();
        let mut eps = vec![
            co_source(1),
            GasEndPoint::new(Slot::from_index(0), GasSourceKind::FreshAir),
        ];
        purge
            .purge(PurgeKind::PostCalibration, &mut eps, &mut [], None)
            .unwrap();

        assert_eq!(purge.calls.len(), 1);
        assert_eq!(eps[1].usage.len(), 1);
        assert_eq!(eps[1].usage[0].purpose, UsagePurpose::SwitchPurge);
    }
}
