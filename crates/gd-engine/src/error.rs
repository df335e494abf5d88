//! Error types for calibration sessions.

use gd_core::{CoreError, GasCode, Slot};
use gd_hal::HalError;
use thiserror::Error;

/// Session-fatal calibration faults.
///
/// Sensor-scoped outcomes (zeroing failure, span failure, hardware abort)
/// are response statuses, not errors; only faults that end the session
/// appear here. Bad pump tubing is surfaced as a flow failure.
#[derive(Error, Debug)]
pub enum CalError {
    #[error("No untried gas source can supply {gas}")]
    GasUnavailable { gas: GasCode },

    // Field deliberately not named `source`: thiserror would treat that
    // as the error's #[source] and require `Slot: std::error::Error`.
    #[error("Gas flow failure at source {slot}: {what}")]
    FlowFailure { slot: Slot, what: &'static str },

    #[error("Instrument undocked during calibration")]
    NotDocked,

    #[error("Hardware fault: {0}")]
    Hardware(#[from] HalError),

    #[error(transparent)]
    Response(#[from] CoreError),
}

pub type CalResult<T> = Result<T, CalError>;
