//! Gas code definitions.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Calibration gases serviced by the docking station.
///
/// A sensor declares the gas code it calibrates against, and every gas end
/// point declares the gas code it supplies. The two are matched by the gas
/// source selector during an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GasCode {
    /// Oxygen (O₂)
    O2,
    /// Carbon monoxide (CO)
    CO,
    /// Hydrogen sulfide (H₂S)
    H2S,
    /// Sulfur dioxide (SO₂)
    SO2,
    /// Nitrogen dioxide (NO₂)
    NO2,
    /// Methane (CH₄)
    CH4,
    /// Pentane (LEL calibration surrogate)
    Pentane,
    /// Hydrogen (H₂)
    H2,
    /// Ammonia (NH₃)
    Ammonia,
    /// Chlorine (Cl₂)
    Chlorine,
    /// Fresh air (zeroing and purge supply, 20.9% O₂)
    FreshAir,
}

impl GasCode {
    pub const ALL: [GasCode; 11] = [
        GasCode::O2,
        GasCode::CO,
        GasCode::H2S,
        GasCode::SO2,
        GasCode::NO2,
        GasCode::CH4,
        GasCode::Pentane,
        GasCode::H2,
        GasCode::Ammonia,
        GasCode::Chlorine,
        GasCode::FreshAir,
    ];

    /// Short symbol as printed on cylinder labels and reports.
    pub fn symbol(&self) -> &'static str {
        match self {
            GasCode::O2 => "O2",
            GasCode::CO => "CO",
            GasCode::H2S => "H2S",
            GasCode::SO2 => "SO2",
            GasCode::NO2 => "NO2",
            GasCode::CH4 => "CH4",
            GasCode::Pentane => "C5H12",
            GasCode::H2 => "H2",
            GasCode::Ammonia => "NH3",
            GasCode::Chlorine => "CL2",
            GasCode::FreshAir => "FRESH AIR",
        }
    }

    /// Oxygen sensors accept fresh air (20.9% O₂) as a calibration supply.
    pub fn is_oxygen(&self) -> bool {
        matches!(self, GasCode::O2)
    }
}

impl fmt::Display for GasCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
