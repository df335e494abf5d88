//! Gas end points and their usage audit records.

use serde::{Deserialize, Serialize};

use crate::gas::GasCode;
use crate::slot::Slot;

/// Remaining pressure in a cylinder, as coarse-graded by the dock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureLevel {
    Full,
    Low,
    /// Empty cylinders are never selected for an attempt.
    Empty,
}

/// A gas cylinder attached to an end point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cylinder {
    pub gas: GasCode,
    /// Labelled concentration (ppm, or %vol for O₂/LEL gases).
    pub concentration: f64,
    pub pressure: PressureLevel,
}

impl Cylinder {
    pub fn new(gas: GasCode, concentration: f64) -> Self {
        Self {
            gas,
            concentration,
            pressure: PressureLevel::Full,
        }
    }

    pub fn with_pressure(mut self, pressure: PressureLevel) -> Self {
        self.pressure = pressure;
        self
    }
}

/// Where an end point's gas comes from.
///
/// A tagged variant rather than a trait object: all kinds share the same
/// usage-tracking fields on [`GasEndPoint`] and differ only in supply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GasSourceKind {
    /// iGas-carded cylinder installed in a dock port.
    CylinderCard(Cylinder),
    /// Cylinder plumbed through a shared manifold.
    Manifold(Cylinder),
    /// Manually declared cylinder with no card.
    Manual(Cylinder),
    /// Ambient fresh air drawn through the dock filter.
    FreshAir,
}

/// Why a gas end point was consumed, for the usage audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsagePurpose {
    Precondition,
    Calibration,
    SwitchPurge,
}

/// Audit record of one consumption of a gas end point.
///
/// These records are the authoritative evidence of what gas was applied to
/// the instrument and for how long; they are written on every path,
/// including faulted attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsedGasEndPoint {
    pub slot: Slot,
    pub gas: GasCode,
    pub concentration: f64,
    pub purpose: UsagePurpose,
    pub duration_s: f64,
}

/// A selectable gas supply: a valve position plus what flows through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasEndPoint {
    /// Solenoid valve position feeding this end point.
    pub slot: Slot,
    pub kind: GasSourceKind,
    /// Accumulated usage records for this session.
    pub usage: Vec<UsedGasEndPoint>,
}

impl GasEndPoint {
    pub fn new(slot: Slot, kind: GasSourceKind) -> Self {
        Self {
            slot,
            kind,
            usage: Vec::new(),
        }
    }

    /// Gas code supplied by this end point.
    pub fn gas_code(&self) -> GasCode {
        match &self.kind {
            GasSourceKind::CylinderCard(c)
            | GasSourceKind::Manifold(c)
            | GasSourceKind::Manual(c) => c.gas,
            GasSourceKind::FreshAir => GasCode::FreshAir,
        }
    }

    /// Labelled concentration of the supply. Fresh air reports the ambient
    /// oxygen fraction in %vol.
    pub fn concentration(&self) -> f64 {
        match &self.kind {
            GasSourceKind::CylinderCard(c)
            | GasSourceKind::Manifold(c)
            | GasSourceKind::Manual(c) => c.concentration,
            GasSourceKind::FreshAir => 20.9,
        }
    }

    /// Remaining pressure. Fresh air is inexhaustible.
    pub fn pressure(&self) -> PressureLevel {
        match &self.kind {
            GasSourceKind::CylinderCard(c)
            | GasSourceKind::Manifold(c)
            | GasSourceKind::Manual(c) => c.pressure,
            GasSourceKind::FreshAir => PressureLevel::Full,
        }
    }

    /// Append a usage record and return a copy for the per-sensor response.
    pub fn record_usage(&mut self, purpose: UsagePurpose, duration_s: f64) -> UsedGasEndPoint {
        let record = UsedGasEndPoint {
            slot: self.slot,
            gas: self.gas_code(),
            concentration: self.concentration(),
            purpose,
            duration_s,
        };
        self.usage.push(record.clone());
        record
    }
}
