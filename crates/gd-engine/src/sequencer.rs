//! Sequential calibration sequencer.
//!
//! Iterates all installed sensors of a docked instrument in slot order,
//! brackets calibration mode, aggregates outcomes into the session verdict
//! and guarantees the cleanup path (exit calibration mode, post-session
//! purge, post-purge readings) runs exactly once, whether reached from
//! the success path or a session-fatal fault.

use gd_core::{DockedInstrument, GasEndPoint, InstalledComponent, Reading, SensorGasResponse};
use gd_hal::{DockPorts, PurgeCoordinator, PurgeKind};
use tracing::{debug, info, warn};

use crate::error::{CalError, CalResult};
use crate::options::SessionOptions;

/// Result of a whole calibration session.
///
/// Audit data (responses and end-point usage records) survives failure
/// paths: a session-fatal fault is carried in `fault` alongside everything
/// recorded up to that point, never instead of it.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Per-sensor outcome records, in processing order.
    pub responses: Vec<SensorGasResponse>,
    /// Gas end points with their accumulated usage records.
    pub end_points: Vec<GasEndPoint>,
    /// Total response time accumulated across sensors, seconds.
    pub cumulative_s: f64,
    /// True when at least one response exists, every status is passing and
    /// no session-fatal fault occurred.
    pub passed: bool,
    /// The session-fatal fault, if any. Cleanup has already run.
    pub fault: Option<CalError>,
}

impl SessionOutcome {
    /// Response for a sensor slot, if that sensor was processed.
    pub fn response_for(&self, slot: gd_core::Slot) -> Option<&SensorGasResponse> {
        self.responses.iter().find(|r| r.slot == slot)
    }
}

/// One calibration session over a docked instrument.
///
/// `run` consumes the session, which is what makes the single cleanup
/// path structural: there is no way to re-enter a finished session.
pub struct CalibrationSession<'a, D: DockPorts + ?Sized, P: PurgeCoordinator + ?Sized> {
    pub(crate) ports: &'a mut D,
    pub(crate) purge: &'a mut P,
    pub(crate) opts: SessionOptions,
    pub(crate) end_points: Vec<GasEndPoint>,
    pub(crate) responses: Vec<SensorGasResponse>,
    pub(crate) cumulative_s: f64,
    /// Index of the end point used by the previous attempt this session;
    /// a change triggers the cylinder-switch purge.
    pub(crate) last_source: Option<usize>,
    in_cal_mode: bool,
}

impl<'a, D: DockPorts + ?Sized, P: PurgeCoordinator + ?Sized> CalibrationSession<'a, D, P> {
    pub fn new(
        ports: &'a mut D,
        purge: &'a mut P,
        end_points: Vec<GasEndPoint>,
        opts: SessionOptions,
    ) -> Self {
        Self {
            ports,
            purge,
            opts,
            end_points,
            responses: Vec::new(),
            cumulative_s: 0.0,
            last_source: None,
            in_cal_mode: false,
        }
    }

    /// Run the session: calibrate every installed, enabled sensor in slot
    /// order, then clean up exactly once.
    ///
    /// Writes bump status and last-calibration time back into the
    /// instrument snapshot for sensors that pass, while still docked.
    pub fn run(mut self, instrument: &mut DockedInstrument) -> SessionOutcome {
        info!(serial = %instrument.serial, "starting calibration session");

        let result = self.calibrate_instrument(instrument);

        // Single cleanup path, regardless of how the loop ended.
        self.cleanup(instrument);

        let fault = result.err();
        let passed = fault.is_none()
            && !self.responses.is_empty()
            && self.responses.iter().all(|r| r.status.is_passing());

        match &fault {
            Some(err) => warn!(error = %err, "calibration session faulted"),
            None => info!(passed, sensors = self.responses.len(), "calibration session finished"),
        }

        SessionOutcome {
            responses: self.responses,
            end_points: self.end_points,
            cumulative_s: self.cumulative_s,
            passed,
            fault,
        }
    }

    fn calibrate_instrument(&mut self, instrument: &mut DockedInstrument) -> CalResult<()> {
        self.ports.enter_calibration_mode()?;
        self.in_cal_mode = true;

        for idx in 0..instrument.components.len() {
            let sensor = match &mut instrument.components[idx] {
                InstalledComponent::Sensor(s) => s,
                other => {
                    debug!(slot = %other.slot(), "skipping non-sensor component");
                    continue;
                }
            };
            if !sensor.enabled {
                debug!(slot = %sensor.slot, "skipping disabled sensor");
                continue;
            }
            self.calibrate_sensor(sensor)?;
        }
        Ok(())
    }

    /// Exit calibration mode, purge, and take post-purge readings.
    ///
    /// Faults on this path are logged and swallowed so they can never mask
    /// a fault from the calibration itself, and the purge is attempted
    /// even when exiting calibration mode fails.
    fn cleanup(&mut self, instrument: &DockedInstrument) {
        if self.in_cal_mode && self.ports.is_docked() {
            if let Err(err) = self.ports.exit_calibration_mode() {
                warn!(error = %err, "failed to exit calibration mode");
            }
            self.in_cal_mode = false;
        }

        if let Err(err) = self.purge.purge(
            PurgeKind::PostCalibration,
            &mut self.end_points,
            &mut self.responses,
            None,
        ) {
            warn!(error = %err, "post-session purge failed");
        }

        for ridx in 0..self.responses.len() {
            if !self.ports.is_docked() {
                debug!("instrument gone; skipping post-purge readings");
                break;
            }
            let slot = self.responses[ridx].slot;
            let resolution = instrument
                .sensors()
                .find(|s| s.slot == slot)
                .map_or(1.0, |s| s.resolution);
            match self.ports.calibration_reading(slot, resolution) {
                Ok(value) => self.responses[ridx].post_purge = Some(Reading::now(value)),
                Err(err) => warn!(slot = %slot, error = %err, "post-purge reading failed"),
            }
        }
    }
}
