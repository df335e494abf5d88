//! Gas source selection for a calibration attempt.

use gd_core::{GasCode, GasEndPoint, PressureLevel};

/// Pick the next untried end point able to supply `gas`.
///
/// End points are considered in list (slot) order. Empty cylinders are
/// skipped. Fresh air additionally satisfies an oxygen requirement, since
/// ambient air carries 20.9% O₂. Returns the index into `end_points`, or
/// `None` when every candidate has been tried, which is the caller's
/// exhaustion signal.
pub fn next_untried(end_points: &[GasEndPoint], gas: GasCode, tried: &[usize]) -> Option<usize> {
    end_points.iter().enumerate().position(|(idx, ep)| {
        if tried.contains(&idx) {
            return false;
        }
        if ep.pressure() == PressureLevel::Empty {
            return false;
        }
        ep.gas_code() == gas || (gas.is_oxygen() && ep.gas_code() == GasCode::FreshAir)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gd_core::{Cylinder, GasSourceKind, Slot};

    fn cylinder(slot: u32, gas: GasCode, pressure: PressureLevel) -> GasEndPoint {
        GasEndPoint::new(
            Slot::from_index(slot),
            GasSourceKind::CylinderCard(Cylinder::new(gas, 100.0).with_pressure(pressure)),
        )
    }

    #[test]
    fn picks_first_matching_source() {
        let eps = vec![
            cylinder(0, GasCode::H2S, PressureLevel::Full),
            cylinder(1, GasCode::CO, PressureLevel::Full),
            cylinder(2, GasCode::CO, PressureLevel::Full),
        ];
        assert_eq!(next_untried(&eps, GasCode::CO, &[]), Some(1));
    }

    #[test]
    fn skips_tried_and_signals_exhaustion() {
        let eps = vec![
            cylinder(0, GasCode::CO, PressureLevel::Full),
            cylinder(1, GasCode::CO, PressureLevel::Full),
        ];
        assert_eq!(next_untried(&eps, GasCode::CO, &[0]), Some(1));
        assert_eq!(next_untried(&eps, GasCode::CO, &[0, 1]), None);
    }

    #[test]
    fn skips_empty_cylinders() {
        let eps = vec![
            cylinder(0, GasCode::CO, PressureLevel::Empty),
            cylinder(1, GasCode::CO, PressureLevel::Low),
        ];
        assert_eq!(next_untried(&eps, GasCode::CO, &[]), Some(1));
    }

    #[test]
    fn fresh_air_satisfies_oxygen_only() {
        let eps = vec![GasEndPoint::new(Slot::from_index(0), GasSourceKind::FreshAir)];
        assert_eq!(next_untried(&eps, GasCode::O2, &[]), Some(0));
        assert_eq!(next_untried(&eps, GasCode::CO, &[]), None);
    }
}
