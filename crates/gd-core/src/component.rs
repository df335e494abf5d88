//! Installed components and the docked-instrument snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gas::GasCode;
use crate::slot::Slot;

/// Bump-test status of a sensor, as last reported by the instrument.
///
/// Bump testing itself is out of scope here; the calibration engine only
/// refreshes this field from hardware during per-sensor finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BumpStatus {
    Passed,
    Failed,
    #[default]
    Unknown,
}

/// A gas sensor installed in an instrument bay.
///
/// Read-only during calibration except for the fields the engine writes
/// back while the instrument is still docked: `bump_status` always, and
/// `last_cal_at` when the sensor passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledSensor {
    /// Bay the sensor occupies.
    pub slot: Slot,
    /// Factory-unique sensor id.
    pub uid: Uuid,
    /// Gas this sensor calibrates against.
    pub gas: GasCode,
    /// Target calibration-gas concentration (ppm, or %vol for O₂/LEL).
    pub cal_concentration: f64,
    /// Reading resolution reported by the sensor (counts per unit).
    pub resolution: f64,
    /// Disabled sensors are skipped by the sequencer entirely.
    pub enabled: bool,
    /// Gas flow rate commanded while calibrating this sensor (L/min).
    pub flow_rate_lpm: f64,
    /// When the sensor was put into service, if known.
    pub setup_at: Option<DateTime<Utc>>,
    /// Last successful calibration, if any.
    pub last_cal_at: Option<DateTime<Utc>>,
    /// Last reported bump-test status.
    pub bump_status: BumpStatus,
}

impl InstalledSensor {
    /// Create a sensor with the common defaults: enabled, 0.5 L/min flow,
    /// fresh uid, no service history.
    pub fn new(slot: Slot, gas: GasCode, cal_concentration: f64, resolution: f64) -> Self {
        Self {
            slot,
            uid: Uuid::new_v4(),
            gas,
            cal_concentration,
            resolution,
            enabled: true,
            flow_rate_lpm: 0.5,
            setup_at: None,
            last_cal_at: None,
            bump_status: BumpStatus::Unknown,
        }
    }

    /// Set the calibration flow rate.
    pub fn with_flow_rate(mut self, flow_rate_lpm: f64) -> Self {
        self.flow_rate_lpm = flow_rate_lpm;
        self
    }

    /// Mark the sensor disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set the in-service date.
    pub fn with_setup_at(mut self, setup_at: DateTime<Utc>) -> Self {
        self.setup_at = Some(setup_at);
        self
    }

    /// Age in whole days since the sensor was put into service.
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.setup_at.map(|s| (now - s).num_days())
    }
}

/// A component occupying an instrument bay.
///
/// Only sensors participate in calibration; other component kinds are
/// skipped by the sequencer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InstalledComponent {
    Sensor(InstalledSensor),
    Battery { slot: Slot },
}

impl InstalledComponent {
    pub fn slot(&self) -> Slot {
        match self {
            InstalledComponent::Sensor(s) => s.slot,
            InstalledComponent::Battery { slot } => *slot,
        }
    }

    pub fn as_sensor(&self) -> Option<&InstalledSensor> {
        match self {
            InstalledComponent::Sensor(s) => Some(s),
            InstalledComponent::Battery { .. } => None,
        }
    }
}

/// Snapshot of the docked instrument taken at dock time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockedInstrument {
    /// Instrument serial number.
    pub serial: String,
    /// Installed components in bay order.
    pub components: Vec<InstalledComponent>,
}

impl DockedInstrument {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            components: Vec::new(),
        }
    }

    /// Add a component, keeping the list sorted by slot.
    pub fn with_component(mut self, component: InstalledComponent) -> Self {
        self.components.push(component);
        self.components.sort_by_key(|c| c.slot());
        self
    }

    /// Iterate installed sensors in slot order.
    pub fn sensors(&self) -> impl Iterator<Item = &InstalledSensor> {
        self.components.iter().filter_map(InstalledComponent::as_sensor)
    }
}
