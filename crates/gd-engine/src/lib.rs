//! gd-engine: the sequential sensor calibration engine.
//!
//! Given a docked instrument snapshot and the available gas end points,
//! the engine drives each installed sensor through zeroing verification,
//! gas exposure, reading polling, pass/fail determination and gas-line
//! purging, tolerating hardware faults, cylinder exhaustion and abrupt
//! undocking.
//!
//! # Architecture
//!
//! - [`selector`]: picks the next untried gas end point for a sensor
//! - [`sensor`]: the per-sensor calibration state machine, the unit of
//!   gas-source retry
//! - [`sequencer`]: iterates all installed sensors, brackets calibration
//!   mode, aggregates the session verdict and guarantees the cleanup path
//!   runs exactly once
//!
//! # Fault tiers
//!
//! Sensor-scoped outcomes are response statuses and never escape the
//! per-sensor boundary. Session-fatal faults travel as [`CalError`] and
//! reach the caller through [`SessionOutcome::fault`] after cleanup.
//! Cleanup faults are logged and swallowed, never masking the original.

pub mod error;
pub mod options;
pub mod selector;
pub mod sensor;
pub mod sequencer;

pub use error::{CalError, CalResult};
pub use options::{AccountPolicy, SessionOptions};
pub use sequencer::{CalibrationSession, SessionOutcome};
