//! Port traits consumed by the calibration engine.
//!
//! Three seams, matching the physical split of the dock:
//! - [`InstrumentPort`]: the docked instrument's wire protocol
//! - [`GasFlowPort`]: the dock's pump and solenoid valves
//! - [`PurgeCoordinator`]: the gas-line purge sub-operation
//!
//! All methods take `&mut self`: every call is a serial transaction on a
//! single physical channel.

use std::time::Duration;

use chrono::{DateTime, Utc};
use gd_core::{BumpStatus, GasEndPoint, InstalledSensor, SensorGasResponse, Slot};

use crate::error::HalResult;

/// Answer to "is this sensor still calibrating?".
///
/// An explicit tri-state rather than `Option<bool>`: `Unavailable` is not
/// missing data, it is the instrument having abandoned the calibration
/// (typically after an internal reset), and the engine branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibratingState {
    /// The sensor is still running its calibration.
    Calibrating,
    /// The calibration finished; a verdict can be queried.
    Done,
    /// The instrument no longer recognizes the calibration.
    Unavailable,
}

/// Why the gas lines are being purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeKind {
    /// Flush between two different gas sources for the same session.
    CylinderSwitch,
    /// Flush at session end, always attempted.
    PostCalibration,
}

/// Wire-protocol operations on the docked instrument.
pub trait InstrumentPort {
    /// Whether an instrument is currently seated in the cradle.
    ///
    /// Infallible by design: the docking switch is local to the dock and
    /// the engine consults it at every suspension point.
    fn is_docked(&self) -> bool;

    /// Put the instrument into calibration mode. Idempotent on hardware;
    /// the engine additionally brackets it exactly once per session.
    fn enter_calibration_mode(&mut self) -> HalResult<()>;

    /// Leave calibration mode.
    fn exit_calibration_mode(&mut self) -> HalResult<()>;

    /// Whether the sensor's clean-air zeroing is already verified.
    fn is_sensor_zeroed(&mut self, slot: Slot) -> HalResult<bool>;

    /// Whether calibration is enabled for this sensor in the instrument's
    /// own configuration.
    fn is_calibration_enabled(&mut self, sensor: &InstalledSensor) -> HalResult<bool>;

    /// Program the concentration the instrument should expect from this
    /// source. Returns the concentration the instrument accepted; `0.0`
    /// means the source cannot supply the sensor's gas.
    fn set_calibration_gas_concentration(
        &mut self,
        sensor: &InstalledSensor,
        source: &GasEndPoint,
    ) -> HalResult<f64>;

    /// Restore a previously programmed concentration after an attempt.
    fn restore_calibration_gas_concentration(
        &mut self,
        sensor: &InstalledSensor,
        concentration: f64,
    ) -> HalResult<()>;

    /// Hardware-reported calibration timeout for the sensor.
    fn sensor_calibration_timeout(&mut self, slot: Slot) -> HalResult<Duration>;

    /// Run the sensor-specific pre-exposure. Returns the time gas flowed.
    fn precondition_sensor(
        &mut self,
        sensor: &InstalledSensor,
        source: &GasEndPoint,
    ) -> HalResult<Duration>;

    /// Stop external gas flow so the sensor can settle.
    fn pause_gas_flow(&mut self, source: &GasEndPoint, sensor: &InstalledSensor) -> HalResult<()>;

    /// Clean-air baseline of the sensor.
    fn sensor_baseline(&mut self, slot: Slot) -> HalResult<f64>;

    /// Zero offset of the sensor.
    fn sensor_zero_offset(&mut self, slot: Slot) -> HalResult<f64>;

    /// Command the instrument to start calibrating the given sensors.
    fn begin_sensor_calibration(&mut self, slots: &[Slot]) -> HalResult<()>;

    /// Current gas reading, scaled by the sensor's resolution.
    fn calibration_reading(&mut self, slot: Slot, resolution: f64) -> HalResult<f64>;

    /// Tri-state calibration progress query.
    fn is_calibrating(&mut self, slot: Slot) -> HalResult<CalibratingState>;

    /// Hardware pass/fail verdict, valid once calibration is done.
    fn calibration_passed(&mut self, slot: Slot) -> HalResult<bool>;

    /// Remaining sensitivity margin after calibration (%).
    fn span_reserve(&mut self, slot: Slot) -> HalResult<f64>;

    /// Timestamp of the sensor's last committed calibration.
    fn last_calibration_time(&mut self, slot: Slot) -> HalResult<DateTime<Utc>>;

    /// Probe for an instrument reset. `context` names the engine step for
    /// the adapter's own diagnostics.
    fn detect_reset(&mut self, context: &str) -> HalResult<bool>;

    /// Current bump-test status of the sensor.
    fn bump_status(&mut self, slot: Slot) -> HalResult<BumpStatus>;
}

/// Pump and solenoid-valve operations.
pub trait GasFlowPort {
    /// Open the end point's valve and run the pump at the given flow rate.
    fn open_gas_end_point(&mut self, source: &GasEndPoint, flow_rate_lpm: f64) -> HalResult<()>;

    /// Close the end point's valve.
    fn close_gas_end_point(&mut self, source: &GasEndPoint) -> HalResult<()>;

    /// Which valve is open right now, if any.
    fn open_valve_position(&self) -> Option<Slot>;

    /// Whether the pump reports kinked or detached tubing.
    fn is_bad_pump_tubing(&mut self) -> HalResult<bool>;

    /// Whether an accessory pump is fitted to the dock.
    fn has_accessory_pump(&self) -> bool;
}

/// The gas-line purge sub-operation, external to this engine.
pub trait PurgeCoordinator {
    /// Flush the gas lines. `affected` names the sensor slot a
    /// cylinder-switch purge is being run for.
    fn purge(
        &mut self,
        kind: PurgeKind,
        end_points: &mut [GasEndPoint],
        responses: &mut [SensorGasResponse],
        affected: Option<Slot>,
    ) -> HalResult<()>;
}

/// Union of the dock-side ports the engine drives through one handle.
pub trait DockPorts: InstrumentPort + GasFlowPort {}

impl<T: InstrumentPort + GasFlowPort> DockPorts for T {}
