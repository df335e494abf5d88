//! gd-hal: hardware port traits for the gasdock calibration engine.
//!
//! The engine never talks to hardware directly; it drives the port traits
//! defined here. Production adapters (instrument wire protocol, pump and
//! solenoid drivers, the purge operation) live outside this workspace. The
//! scriptable [`MockDock`] stands in for them in tests and the CLI
//! simulator.

pub mod error;
pub mod mock;
pub mod ports;

pub use error::{HalError, HalResult};
pub use mock::{MockDock, MockEvent, MockPurge};
pub use ports::{CalibratingState, DockPorts, GasFlowPort, InstrumentPort, PurgeCoordinator, PurgeKind};
