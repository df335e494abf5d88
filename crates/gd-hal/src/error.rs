//! Error types for hardware port operations.

use gd_core::Slot;
use thiserror::Error;

/// Faults raised by hardware adapters.
#[derive(Error, Debug)]
pub enum HalError {
    #[error("Instrument communication failed: {what}")]
    Comm { what: String },

    #[error("Malformed instrument reply: {what}")]
    Protocol { what: String },

    #[error("Valve already open at position {0}")]
    ValveBusy(Slot),

    #[error("Pump fault: {what}")]
    Pump { what: &'static str },
}

pub type HalResult<T> = Result<T, HalError>;
