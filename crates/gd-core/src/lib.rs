//! gd-core: stable data model for the gasdock calibration engine.
//!
//! Contains:
//! - slot (compact position IDs for sensors, components and valves)
//! - gas (gas codes serviced by the dock)
//! - component (installed sensors and the docked-instrument snapshot)
//! - endpoint (gas end points and their usage audit records)
//! - response (per-sensor calibration outcome records)
//! - error (shared error types)

pub mod component;
pub mod endpoint;
pub mod error;
pub mod gas;
pub mod response;
pub mod slot;

// Re-exports: nice ergonomics for downstream crates
pub use component::{BumpStatus, DockedInstrument, InstalledComponent, InstalledSensor};
pub use endpoint::{Cylinder, GasEndPoint, GasSourceKind, PressureLevel, UsagePurpose, UsedGasEndPoint};
pub use error::{CoreError, CoreResult};
pub use gas::GasCode;
pub use response::{Reading, ResponseStatus, SensorGasResponse};
pub use slot::Slot;
